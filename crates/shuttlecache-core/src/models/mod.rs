//! Data models for shuttle scheduling.
//!
//! Master rows (`Facility`, `Vehicle`, `Course`, `User`) mirror spreadsheet
//! rows and use the backend's column names on the wire. Day data
//! (`Schedule`, `Template`, `PendingRecord`) uses camelCase keys.

pub mod cell;
pub mod course;
pub mod facility;
pub mod info;
pub mod master;
pub mod record;
pub mod schedule;
pub mod template;
pub mod user;
pub mod vehicle;

pub use course::{facility_for_course, Course};
pub use facility::{default_facility, Facility};
pub use info::ApiInfo;
pub use master::{FieldKind, MasterField, MasterType, ACTIVE_FIELD};
pub use record::{BatchResult, FailedRecord, PendingRecord};
pub use schedule::{visible_schedules, RideStatus, Schedule, ScheduleFilter, ScheduleRow, TripType};
pub use template::{Template, TemplateItem};
pub use user::{user_name, User};
pub use vehicle::{vehicles_for_facility, Vehicle};
