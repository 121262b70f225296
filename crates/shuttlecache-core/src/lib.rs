//! Core library for the shuttle pickup/dropoff tracker.
//!
//! Drivers check riders in and out against a day's schedule; every change
//! is applied locally first and queued for delivery, so a dead zone on the
//! route never loses a check-in. Admins watch course progress and maintain
//! schedules, templates and masters.

pub mod admin;
pub mod api;
pub mod config;
pub mod connectivity;
pub mod data;
pub mod models;
pub mod store;
pub mod sync;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use connectivity::Connectivity;
pub use data::{DataManager, InitReport, LoadOutcome, ScheduleScope};
pub use store::{Store, StoreError};
pub use sync::{RecordSender, SyncConfig, SyncManager, SyncOutcome, SyncReport};
