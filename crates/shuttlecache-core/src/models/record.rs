use serde::{Deserialize, Serialize};

use super::schedule::RideStatus;

/// A status change waiting to be delivered to the backend.
///
/// `timestamp` is the queue key: milliseconds since the epoch, unique
/// within the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    pub schedule_id: String,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub status: Option<RideStatus>,
    #[serde(default)]
    pub note: Option<String>,
    pub date: String,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub attendant: String,
    /// Assigned when the record is queued.
    #[serde(default)]
    pub timestamp: i64,
}

/// One item the backend refused in a `checkInBatch` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct FailedRecord {
    pub timestamp: i64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Data of a `checkInBatch` response. Records not listed in `failed` were
/// written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct BatchResult {
    #[serde(default)]
    pub failed: Vec<FailedRecord>,
}

impl BatchResult {
    pub fn failed_timestamps(&self) -> std::collections::HashSet<i64> {
        self.failed.iter().map(|f| f.timestamp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_shape() {
        let record = PendingRecord {
            schedule_id: "S1".to_string(),
            status: Some(RideStatus::Boarded),
            note: None,
            date: "2026-10-19".to_string(),
            facility_id: Some("F1".to_string()),
            vehicle_id: Some("V1".to_string()),
            driver: "佐藤".to_string(),
            attendant: String::new(),
            timestamp: 1_760_000_000_000,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["scheduleId"], "S1");
        assert_eq!(value["status"], "乗車済");
        assert_eq!(value["facilityId"], "F1");
        assert_eq!(value["timestamp"], 1_760_000_000_000i64);
    }

    #[test]
    fn test_cleared_status_is_null() {
        let json = r#"{"scheduleId": "S1", "status": null, "date": "2026-10-19", "timestamp": 5}"#;
        let record: PendingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, None);
        assert_eq!(serde_json::to_value(&record).unwrap()["status"], serde_json::Value::Null);
    }

    #[test]
    fn test_batch_result_defaults_to_no_failures() {
        let result: BatchResult = serde_json::from_str("{}").unwrap();
        assert!(result.failed_timestamps().is_empty());

        let result: BatchResult =
            serde_json::from_str(r#"{"failed": [{"timestamp": 3, "error": "row locked"}]}"#).unwrap();
        assert!(result.failed_timestamps().contains(&3));
    }
}
