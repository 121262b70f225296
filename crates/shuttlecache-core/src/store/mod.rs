//! Local state persisted between runs.
//!
//! This module provides the `Store`, which holds the last fetched masters
//! and schedule, the driver's current selections, and the queue of
//! check-ins not yet delivered. State lives under four keys:
//!
//! - `ks_data`: masters, schedules, templates and pending records
//! - `ks_status`: current facility/course/vehicle/date and flags
//! - `ks_driver`, `ks_attendant`: the last entered crew names

pub mod state;
pub mod storage;

pub use state::{Store, StoreData, StoreStatus};
pub use storage::LocalStorage;

use thiserror::Error;

pub const DATA_KEY: &str = "ks_data";
pub const STATUS_KEY: &str = "ks_status";
pub const DRIVER_KEY: &str = "ks_driver";
pub const ATTENDANT_KEY: &str = "ks_attendant";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error("Failed to parse stored {key}: {source}")]
    Corrupt {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}
