use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cell;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Vehicle {
    #[serde(rename = "車両ID", default, deserialize_with = "cell::text")]
    pub id: String,
    #[serde(rename = "車両名", default, deserialize_with = "cell::text")]
    pub name: String,
    #[serde(rename = "車種", default, deserialize_with = "cell::opt_text")]
    pub model: Option<String>,
    #[serde(rename = "ナンバー", default, deserialize_with = "cell::opt_text")]
    pub plate: Option<String>,
    #[serde(rename = "定員", default, deserialize_with = "cell::opt_number")]
    pub capacity: Option<u32>,
    #[serde(rename = "事業所ID", default, deserialize_with = "cell::opt_text")]
    pub facility_id: Option<String>,
    #[serde(rename = "有効", default = "cell::default_true", deserialize_with = "cell::flag_default_on")]
    pub active: bool,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

impl Vehicle {
    /// Model and plate on one line, e.g. "ハイエース 品川 300 あ 12-34".
    pub fn detail(&self) -> String {
        [self.model.as_deref(), self.plate.as_deref()]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Vehicles to offer for a facility. With `show_all` or no facility
/// selected every vehicle is returned.
pub fn vehicles_for_facility<'a>(
    vehicles: &'a [Vehicle],
    facility_id: Option<&str>,
    show_all: bool,
) -> Vec<&'a Vehicle> {
    match facility_id {
        Some(id) if !show_all => vehicles
            .iter()
            .filter(|v| v.facility_id.as_deref() == Some(id))
            .collect(),
        _ => vehicles.iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(id: &str, facility: Option<&str>) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            name: format!("car {id}"),
            facility_id: facility.map(String::from),
            active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_vehicle_row() {
        let json = r#"{"車両ID": "V1", "車両名": "1号車", "車種": "ハイエース", "ナンバー": "12-34", "定員": "8", "事業所ID": 1, "有効": true}"#;
        let v: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(v.capacity, Some(8));
        assert_eq!(v.facility_id.as_deref(), Some("1"));
        assert_eq!(v.detail(), "ハイエース 12-34");
    }

    #[test]
    fn test_vehicles_for_facility() {
        let vehicles = vec![vehicle("1", Some("A")), vehicle("2", Some("B")), vehicle("3", None)];

        let scoped = vehicles_for_facility(&vehicles, Some("A"), false);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "1");

        assert_eq!(vehicles_for_facility(&vehicles, Some("A"), true).len(), 3);
        assert_eq!(vehicles_for_facility(&vehicles, None, false).len(), 3);
    }

    #[test]
    fn test_inactive_vehicles_are_listed() {
        let mut retired = vehicle("9", Some("A"));
        retired.active = false;
        let vehicles = vec![vehicle("1", Some("A")), retired];

        assert_eq!(vehicles_for_facility(&vehicles, Some("A"), false).len(), 2);
    }
}
