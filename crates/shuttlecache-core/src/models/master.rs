use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which master table an edit targets. Serialized as the `type` field of
/// `updateMasterData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasterType {
    User,
    Vehicle,
    Course,
    Facility,
}

/// Input kind of a master column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Checkbox,
    /// A facility id picked from the facility master.
    FacilitySelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Assigned by the backend; never edited.
    pub readonly: bool,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> MasterField {
    MasterField { key, label, kind, readonly: false }
}

const fn id_field(key: &'static str) -> MasterField {
    MasterField { key, label: "ID", kind: FieldKind::Text, readonly: true }
}

/// Column holding the active flag in every master.
pub const ACTIVE_FIELD: &str = "有効";

const USER_FIELDS: &[MasterField] = &[
    id_field("利用者ID"),
    field("氏名", "氏名", FieldKind::Text),
    field("フリガナ", "フリガナ", FieldKind::Text),
    field("住所", "住所", FieldKind::Text),
    field("事業所ID", "事業所", FieldKind::FacilitySelect),
    field("備考", "備考", FieldKind::Text),
    field(ACTIVE_FIELD, "有効", FieldKind::Checkbox),
];

const VEHICLE_FIELDS: &[MasterField] = &[
    id_field("車両ID"),
    field("車両名", "車両名", FieldKind::Text),
    field("車種", "車種", FieldKind::Text),
    field("ナンバー", "ナンバー", FieldKind::Text),
    field("定員", "定員", FieldKind::Number),
    field("事業所ID", "事業所", FieldKind::FacilitySelect),
    field(ACTIVE_FIELD, "有効", FieldKind::Checkbox),
];

const COURSE_FIELDS: &[MasterField] = &[
    id_field("コースID"),
    field("コース名", "コース名", FieldKind::Text),
    field("事業所ID", "事業所", FieldKind::FacilitySelect),
    field(ACTIVE_FIELD, "有効", FieldKind::Checkbox),
];

const FACILITY_FIELDS: &[MasterField] = &[
    id_field("事業所ID"),
    field("事業所名", "事業所名", FieldKind::Text),
    field("デフォルト", "デフォルト", FieldKind::Checkbox),
    field(ACTIVE_FIELD, "有効", FieldKind::Checkbox),
];

impl MasterType {
    pub const ALL: [MasterType; 4] = [
        MasterType::User,
        MasterType::Vehicle,
        MasterType::Course,
        MasterType::Facility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MasterType::User => "user",
            MasterType::Vehicle => "vehicle",
            MasterType::Course => "course",
            MasterType::Facility => "facility",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MasterType::User => "利用者マスタ",
            MasterType::Vehicle => "車両マスタ",
            MasterType::Course => "コースマスタ",
            MasterType::Facility => "事業所マスタ",
        }
    }

    /// Column that identifies a row. Empty for rows not yet saved.
    pub fn id_field(&self) -> &'static str {
        self.fields()[0].key
    }

    pub fn fields(&self) -> &'static [MasterField] {
        match self {
            MasterType::User => USER_FIELDS,
            MasterType::Vehicle => VEHICLE_FIELDS,
            MasterType::Course => COURSE_FIELDS,
            MasterType::Facility => FACILITY_FIELDS,
        }
    }

    pub fn field(&self, key: &str) -> Option<&'static MasterField> {
        self.fields().iter().find(|f| f.key == key)
    }
}

impl fmt::Display for MasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MasterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MasterType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown master type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_fields() {
        assert_eq!(MasterType::User.id_field(), "利用者ID");
        assert_eq!(MasterType::Vehicle.id_field(), "車両ID");
        assert_eq!(MasterType::Course.id_field(), "コースID");
        assert_eq!(MasterType::Facility.id_field(), "事業所ID");
        for t in MasterType::ALL {
            assert!(t.fields()[0].readonly);
            assert!(t.field(ACTIVE_FIELD).is_some());
        }
    }

    #[test]
    fn test_parse_and_serialize() {
        assert_eq!("Vehicle".parse::<MasterType>(), Ok(MasterType::Vehicle));
        assert!("driver".parse::<MasterType>().is_err());
        assert_eq!(serde_json::to_value(MasterType::Course).unwrap(), "course");
    }
}
