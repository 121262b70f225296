use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cell;

/// A rider registered at a facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct User {
    #[serde(rename = "利用者ID", default, deserialize_with = "cell::text")]
    pub id: String,
    #[serde(rename = "氏名", default, deserialize_with = "cell::text")]
    pub name: String,
    #[serde(rename = "フリガナ", default, deserialize_with = "cell::opt_text")]
    pub kana: Option<String>,
    #[serde(rename = "住所", default, deserialize_with = "cell::opt_text")]
    pub address: Option<String>,
    #[serde(rename = "事業所ID", default, deserialize_with = "cell::opt_text")]
    pub facility_id: Option<String>,
    #[serde(rename = "備考", default, deserialize_with = "cell::opt_text")]
    pub note: Option<String>,
    #[serde(rename = "有効", default = "cell::default_true", deserialize_with = "cell::flag_default_on")]
    pub active: bool,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

/// Display name for a user id, if the id is in the master.
pub fn user_name<'a>(users: &'a [User], user_id: &str) -> Option<&'a str> {
    users.iter().find(|u| u.id == user_id).map(|u| u.name.as_str())
}
