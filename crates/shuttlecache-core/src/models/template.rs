use serde::{Deserialize, Serialize};

use super::cell;
use super::schedule::TripType;

/// A saved, ordered list of course stops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default, deserialize_with = "cell::text")]
    pub template_id: String,
    #[serde(default, deserialize_with = "cell::text")]
    pub template_name: String,
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub course_id: Option<String>,
    #[serde(default)]
    pub items: Vec<TemplateItem>,
}

/// One stop of a template. Templates carry no vehicle; the vehicle is
/// chosen when the template is expanded into a day's schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct TemplateItem {
    #[serde(default, deserialize_with = "cell::text")]
    pub user_id: String,
    #[serde(rename = "type", default)]
    pub trip_type: TripType,
    #[serde(default, deserialize_with = "cell::text")]
    pub time: String,
    #[serde(default, deserialize_with = "cell::opt_number")]
    pub route_order: Option<u32>,
}
