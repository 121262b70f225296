use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cell;

/// A care site. Scopes courses, vehicles and users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Facility {
    #[serde(rename = "事業所ID", default, deserialize_with = "cell::text")]
    pub id: String,
    #[serde(rename = "事業所名", default, deserialize_with = "cell::text")]
    pub name: String,
    #[serde(rename = "デフォルト", default, deserialize_with = "cell::flag")]
    pub is_default: bool,
    #[serde(rename = "有効", default = "cell::default_true", deserialize_with = "cell::flag_default_on")]
    pub active: bool,
    /// Columns this client does not model, kept so saves do not drop them.
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

/// Pick the facility a fresh session should start on.
pub fn default_facility(facilities: &[Facility]) -> Option<&Facility> {
    facilities.iter().find(|f| f.is_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_facility_row() {
        let json = r#"{"事業所ID": 1, "事業所名": "きらり本店", "デフォルト": "TRUE", "有効": "", "電話": "03-0000-0000"}"#;
        let facility: Facility = serde_json::from_str(json).unwrap();
        assert_eq!(facility.id, "1");
        assert_eq!(facility.name, "きらり本店");
        assert!(facility.is_default);
        assert!(facility.active);
        assert_eq!(facility.extra.get("電話").and_then(|v| v.as_str()), Some("03-0000-0000"));
    }

    #[test]
    fn test_extra_columns_round_trip() {
        let json = r#"{"事業所ID": "F1", "事業所名": "A", "電話": "1"}"#;
        let facility: Facility = serde_json::from_str(json).unwrap();
        let value = serde_json::to_value(&facility).unwrap();
        assert_eq!(value["電話"], "1");
        assert_eq!(value["事業所ID"], "F1");
    }

    #[test]
    fn test_default_facility() {
        let facilities = vec![
            Facility { id: "a".into(), ..Default::default() },
            Facility { id: "b".into(), is_default: true, ..Default::default() },
        ];
        assert_eq!(default_facility(&facilities).map(|f| f.id.as_str()), Some("b"));
        assert!(default_facility(&facilities[..1]).is_none());
    }
}
