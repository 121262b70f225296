use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cell;

/// A named route grouping the pickups and dropoffs of a day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Course {
    #[serde(rename = "コースID", default, deserialize_with = "cell::text")]
    pub id: String,
    #[serde(rename = "コース名", default, deserialize_with = "cell::text")]
    pub name: String,
    #[serde(rename = "事業所ID", default, deserialize_with = "cell::opt_text")]
    pub facility_id: Option<String>,
    #[serde(rename = "有効", default = "cell::default_true", deserialize_with = "cell::flag_default_on")]
    pub active: bool,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

/// Facility owning a course, or an empty string when the course is unknown.
pub fn facility_for_course(courses: &[Course], course_id: &str) -> String {
    courses
        .iter()
        .find(|c| c.id == course_id)
        .and_then(|c| c.facility_id.clone())
        .unwrap_or_default()
}
