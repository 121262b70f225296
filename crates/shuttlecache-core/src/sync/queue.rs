//! The persisted list of check-ins waiting for delivery.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::PendingRecord;

/// Pending check-ins in the order they were queued.
///
/// Records are keyed by `timestamp`, which `push` keeps unique: a stamp
/// that would collide with (or precede) the newest queued stamp is bumped
/// past it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingQueue {
    records: Vec<PendingRecord>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `record` with `now_ms` (or the next free key) and append it.
    /// Returns the assigned key.
    pub fn push(&mut self, mut record: PendingRecord, now_ms: i64) -> i64 {
        let timestamp = match self.newest_timestamp() {
            Some(newest) if now_ms <= newest => newest + 1,
            _ => now_ms,
        };
        record.timestamp = timestamp;
        self.records.push(record);
        timestamp
    }

    fn newest_timestamp(&self) -> Option<i64> {
        self.records.iter().map(|r| r.timestamp).max()
    }

    /// Remove the records whose keys are in `delivered`. Records queued
    /// after the caller took its snapshot are untouched.
    pub fn remove_delivered(&mut self, delivered: &HashSet<i64>) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !delivered.contains(&r.timestamp));
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PendingRecord] {
        &self.records
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.records.iter().any(|r| r.timestamp == timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(schedule_id: &str) -> PendingRecord {
        PendingRecord {
            schedule_id: schedule_id.to_string(),
            status: None,
            note: None,
            date: "2026-10-19".to_string(),
            facility_id: None,
            vehicle_id: None,
            driver: String::new(),
            attendant: String::new(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_push_stamps_with_clock() {
        let mut queue = PendingQueue::new();
        assert_eq!(queue.push(record("a"), 1000), 1000);
        assert_eq!(queue.push(record("b"), 1500), 1500);
        assert_eq!(queue.records()[1].timestamp, 1500);
    }

    #[test]
    fn test_same_millisecond_pushes_get_distinct_keys() {
        let mut queue = PendingQueue::new();
        let first = queue.push(record("a"), 1000);
        let second = queue.push(record("b"), 1000);
        let third = queue.push(record("c"), 999);
        assert_eq!((first, second, third), (1000, 1001, 1002));
    }

    #[test]
    fn test_remove_delivered_keeps_others() {
        let mut queue = PendingQueue::new();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            queue.push(record(id), 10 + i as i64);
        }

        let removed = queue.remove_delivered(&HashSet::from([10, 12, 99]));
        assert_eq!(removed, 2);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(11));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let mut queue = PendingQueue::new();
        queue.push(record("a"), 1);
        let value = serde_json::to_value(&queue).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["scheduleId"], "a");
    }
}
