use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{
    default_facility, Course, Facility, PendingRecord, RideStatus, Schedule, Template, User, Vehicle,
};
use crate::sync::PendingQueue;

use super::{LocalStorage, StoreError, ATTENDANT_KEY, DATA_KEY, DRIVER_KEY, STATUS_KEY};

/// Everything fetched from the backend plus the outgoing queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreData {
    pub courses: Vec<Course>,
    pub templates: Vec<Template>,
    pub facilities: Vec<Facility>,
    pub vehicles: Vec<Vehicle>,
    pub users: Vec<User>,
    pub schedules: Vec<Schedule>,
    pub pending_records: PendingQueue,
}

/// The session's current selections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreStatus {
    pub current_facility: Option<String>,
    pub current_course: Option<String>,
    pub current_vehicle: Option<String>,
    pub current_driver: String,
    pub current_attendant: String,
    pub current_date: NaiveDate,
    pub is_offline: bool,
    /// When masters were last fetched successfully.
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl Default for StoreStatus {
    fn default() -> Self {
        Self {
            current_facility: None,
            current_course: None,
            current_vehicle: None,
            current_driver: String::new(),
            current_attendant: String::new(),
            current_date: Local::now().date_naive(),
            is_offline: false,
            last_refreshed: None,
        }
    }
}

pub struct Store {
    storage: LocalStorage,
    pub data: StoreData,
    pub status: StoreStatus,
}

impl Store {
    /// Open the store in `dir` and load whatever was saved there.
    pub fn open(dir: PathBuf) -> Result<Self, StoreError> {
        let mut store = Self {
            storage: LocalStorage::new(dir)?,
            data: StoreData::default(),
            status: StoreStatus::default(),
        };
        store.load()?;
        Ok(store)
    }

    /// Reload state from storage. Keys that were never written keep their
    /// current values.
    pub fn load(&mut self) -> Result<(), StoreError> {
        if let Some(raw) = self.storage.get_item(DATA_KEY)? {
            self.data = serde_json::from_str(&raw)
                .map_err(|source| StoreError::Corrupt { key: DATA_KEY, source })?;
        }
        if let Some(raw) = self.storage.get_item(STATUS_KEY)? {
            self.status = serde_json::from_str(&raw)
                .map_err(|source| StoreError::Corrupt { key: STATUS_KEY, source })?;
        }
        // Crew names outlive the status blob
        if let Some(driver) = self.storage.get_item(DRIVER_KEY)? {
            self.status.current_driver = driver;
        }
        if let Some(attendant) = self.storage.get_item(ATTENDANT_KEY)? {
            self.status.current_attendant = attendant;
        }

        debug!(
            schedules = self.data.schedules.len(),
            pending = self.data.pending_records.len(),
            "Store loaded"
        );
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.storage.set_item(DATA_KEY, &serde_json::to_string(&self.data)?)?;
        self.storage.set_item(STATUS_KEY, &serde_json::to_string(&self.status)?)?;
        Ok(())
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    // ===== Selections =====

    pub fn set_driver(&mut self, name: &str) -> Result<(), StoreError> {
        self.status.current_driver = name.to_string();
        self.storage.set_item(DRIVER_KEY, name)?;
        self.save()
    }

    pub fn set_attendant(&mut self, name: &str) -> Result<(), StoreError> {
        self.status.current_attendant = name.to_string();
        self.storage.set_item(ATTENDANT_KEY, name)?;
        self.save()
    }

    pub fn select_facility(&mut self, facility_id: Option<String>) -> Result<(), StoreError> {
        self.status.current_facility = facility_id;
        self.save()
    }

    pub fn select_course(&mut self, course_id: Option<String>) -> Result<(), StoreError> {
        self.status.current_course = course_id;
        self.save()
    }

    pub fn select_vehicle(&mut self, vehicle_id: Option<String>) -> Result<(), StoreError> {
        self.status.current_vehicle = vehicle_id;
        self.save()
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), StoreError> {
        self.status.current_date = date;
        self.save()
    }

    /// Select the master's default facility if none is selected yet.
    /// Returns true when the selection changed. Does not save.
    pub fn apply_default_facility(&mut self) -> bool {
        if self.status.current_facility.is_some() {
            return false;
        }
        match default_facility(&self.data.facilities) {
            Some(facility) => {
                info!(facility = %facility.id, "Selecting default facility");
                self.status.current_facility = Some(facility.id.clone());
                true
            }
            None => false,
        }
    }

    pub fn current_vehicle(&self) -> Option<&Vehicle> {
        let id = self.status.current_vehicle.as_deref()?;
        self.data.vehicles.iter().find(|v| v.id == id)
    }

    // ===== Schedules =====

    pub fn schedule(&self, schedule_id: &str) -> Option<&Schedule> {
        self.data
            .schedules
            .iter()
            .find(|s| s.schedule_id.as_deref() == Some(schedule_id))
    }

    /// Apply a status change locally and describe it as a record for the
    /// queue. `note: None` leaves the existing note alone.
    ///
    /// The change is saved before the record is returned, so the local view
    /// stays updated even if delivery has to wait.
    pub fn update_status(
        &mut self,
        schedule_id: &str,
        status: Option<RideStatus>,
        note: Option<String>,
    ) -> Result<PendingRecord, StoreError> {
        let schedule = self
            .data
            .schedules
            .iter_mut()
            .find(|s| s.schedule_id.as_deref() == Some(schedule_id))
            .ok_or_else(|| StoreError::ScheduleNotFound(schedule_id.to_string()))?;

        schedule.status = status.clone();
        if let Some(note) = note {
            schedule.note = Some(note).filter(|n| !n.is_empty());
        }
        let note = schedule.note.clone();
        self.save()?;

        Ok(PendingRecord {
            schedule_id: schedule_id.to_string(),
            status,
            note,
            date: self.status.current_date.format("%Y-%m-%d").to_string(),
            facility_id: self.status.current_facility.clone(),
            vehicle_id: self.status.current_vehicle.clone(),
            driver: self.status.current_driver.clone(),
            attendant: self.status.current_attendant.clone(),
            timestamp: 0,
        })
    }

    /// One-tap check: flip between the trip's done status and no status.
    pub fn toggle_check(&mut self, schedule_id: &str) -> Result<PendingRecord, StoreError> {
        let next = self
            .schedule(schedule_id)
            .ok_or_else(|| StoreError::ScheduleNotFound(schedule_id.to_string()))?
            .toggled_status();
        self.update_status(schedule_id, next, None)
    }

    // ===== Pending queue =====

    /// Queue a record and persist the queue. Returns its key.
    pub fn enqueue(&mut self, record: PendingRecord, now_ms: i64) -> Result<i64, StoreError> {
        let timestamp = self.data.pending_records.push(record, now_ms);
        self.save()?;
        Ok(timestamp)
    }

    /// Drop delivered records and persist the queue.
    pub fn remove_delivered(&mut self, delivered: &HashSet<i64>) -> Result<usize, StoreError> {
        let removed = self.data.pending_records.remove_delivered(delivered);
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.data.pending_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TripType;

    fn schedule(id: &str, trip_type: TripType) -> Schedule {
        Schedule {
            schedule_id: Some(id.to_string()),
            user_id: "U1".to_string(),
            user_name: "山田".to_string(),
            trip_type,
            scheduled_time: "08:30".to_string(),
            ..Default::default()
        }
    }

    fn open(dir: &tempfile::TempDir) -> Store {
        Store::open(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_empty_dir_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.data.schedules.is_empty());
        assert!(store.pending().is_empty());
        assert_eq!(store.status.current_date, Local::now().date_naive());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(&dir);
            store.data.schedules.push(schedule("S1", TripType::Pickup));
            store.select_vehicle(Some("V1".to_string())).unwrap();
            store.set_driver("佐藤").unwrap();
            store.set_attendant("鈴木").unwrap();
        }

        let store = open(&dir);
        assert_eq!(store.data.schedules.len(), 1);
        assert_eq!(store.status.current_vehicle.as_deref(), Some("V1"));
        assert_eq!(store.status.current_driver, "佐藤");
        assert_eq!(store.status.current_attendant, "鈴木");
    }

    #[test]
    fn test_crew_names_restored_without_status() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(&dir);
            store.set_driver("佐藤").unwrap();
        }
        std::fs::remove_file(dir.path().join(STATUS_KEY)).unwrap();

        let store = open(&dir);
        assert_eq!(store.status.current_driver, "佐藤");
    }

    #[test]
    fn test_status_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.select_facility(Some("F1".to_string())).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(STATUS_KEY)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["currentFacility"], "F1");

        let raw = std::fs::read_to_string(dir.path().join(DATA_KEY)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["pendingRecords"].is_array());
    }

    #[test]
    fn test_corrupt_data_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DATA_KEY), "{not json").unwrap();
        let err = Store::open(dir.path().to_path_buf()).err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { key: DATA_KEY, .. }));
    }

    #[test]
    fn test_update_status_builds_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.data.schedules.push(schedule("S1", TripType::Pickup));
        store.status.current_facility = Some("F1".to_string());
        store.status.current_vehicle = Some("V1".to_string());
        store.status.current_driver = "佐藤".to_string();

        let record = store
            .update_status("S1", Some(RideStatus::Absent), Some("発熱".to_string()))
            .unwrap();
        assert_eq!(record.status, Some(RideStatus::Absent));
        assert_eq!(record.note.as_deref(), Some("発熱"));
        assert_eq!(record.facility_id.as_deref(), Some("F1"));
        assert_eq!(record.driver, "佐藤");
        assert_eq!(store.schedule("S1").unwrap().status, Some(RideStatus::Absent));

        // Status-only change keeps the note
        let record = store.update_status("S1", None, None).unwrap();
        assert_eq!(record.note.as_deref(), Some("発熱"));
    }

    #[test]
    fn test_update_unknown_schedule_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let err = store.update_status("missing", None, None).unwrap_err();
        assert!(matches!(err, StoreError::ScheduleNotFound(ref id) if id == "missing"));
    }

    #[test]
    fn test_toggle_check_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.data.schedules.push(schedule("S1", TripType::Dropoff));

        let first = store.toggle_check("S1").unwrap();
        assert_eq!(first.status, Some(RideStatus::Alighted));

        let second = store.toggle_check("S1").unwrap();
        assert_eq!(second.status, None);
        assert_eq!(store.schedule("S1").unwrap().status, None);
    }

    #[test]
    fn test_default_facility_only_when_unset() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.data.facilities = vec![
            Facility { id: "F1".into(), ..Default::default() },
            Facility { id: "F2".into(), is_default: true, ..Default::default() },
        ];

        assert!(store.apply_default_facility());
        assert_eq!(store.status.current_facility.as_deref(), Some("F2"));

        store.status.current_facility = Some("F1".into());
        assert!(!store.apply_default_facility());
        assert_eq!(store.status.current_facility.as_deref(), Some("F1"));
    }

    #[test]
    fn test_queue_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(&dir);
            store.data.schedules.push(schedule("S1", TripType::Pickup));
            let record = store.toggle_check("S1").unwrap();
            store.enqueue(record.clone(), 100).unwrap();
            store.enqueue(record, 100).unwrap();
        }

        let mut store = open(&dir);
        assert_eq!(store.pending().len(), 2);
        assert_eq!(store.remove_delivered(&HashSet::from([100])).unwrap(), 1);

        let store = open(&dir);
        assert_eq!(store.pending().records()[0].timestamp, 101);
    }
}
