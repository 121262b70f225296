//! Draft editing of one course's schedule for a day.
//!
//! The editor works on copies: nothing reaches the backend until `save`
//! posts the whole course with route order renumbered from the row order.

use std::str::FromStr;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::api::ApiClient;
use crate::models::{
    facility_for_course, user_name, Course, Schedule, ScheduleRow, Template, TemplateItem,
    TripType, User, Vehicle,
};
use crate::store::{LocalStorage, StoreError};

/// Storage key holding the open editor between sessions.
pub const EDITOR_KEY: &str = "ks_editor";

/// Route order used for rows that have none.
const UNORDERED: u32 = 99;

const DEFAULT_TIME: &str = "09:00";

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("No row {0}")]
    RowOutOfRange(usize),

    #[error("Row {0}: user and time are required")]
    MissingRequired(usize),

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Unknown field: {0} (expected time, type, user or vehicle)")]
    UnknownField(String),
}

/// Editable columns of a draft row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Time,
    Type,
    User,
    Vehicle,
}

impl FromStr for DraftField {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time" => Ok(DraftField::Time),
            "type" => Ok(DraftField::Type),
            "user" => Ok(DraftField::User),
            "vehicle" => Ok(DraftField::Vehicle),
            other => Err(EditorError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEditor {
    course_id: String,
    date: NaiveDate,
    drafts: Vec<Schedule>,
}

impl ScheduleEditor {
    /// Start editing `course_id` from the loaded schedules, in route order.
    pub fn from_schedules(course_id: &str, date: NaiveDate, schedules: &[Schedule]) -> Self {
        let mut drafts: Vec<Schedule> = schedules
            .iter()
            .filter(|s| s.course_id.as_deref() == Some(course_id))
            .cloned()
            .collect();
        // An order of 0 counts as unset
        drafts.sort_by_key(|s| s.route_order.filter(|&o| o != 0).unwrap_or(UNORDERED));

        Self {
            course_id: course_id.to_string(),
            date,
            drafts,
        }
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn drafts(&self) -> &[Schedule] {
        &self.drafts
    }

    /// Replace every draft with the template's stops as new rows.
    pub fn load_template(&mut self, template: &Template, users: &[User]) {
        self.drafts = template
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| Schedule {
                schedule_id: None,
                course_id: Some(self.course_id.clone()),
                user_id: item.user_id.clone(),
                user_name: user_name(users, &item.user_id)
                    .unwrap_or(&item.user_id)
                    .to_string(),
                trip_type: item.trip_type,
                scheduled_time: item.time.clone(),
                vehicle_id: None,
                vehicle_name: None,
                route_order: Some(i as u32 + 1),
                ..Default::default()
            })
            .collect();
        info!(template = %template.template_id, rows = self.drafts.len(), "Template loaded into editor");
    }

    pub fn add_empty_row(&mut self) -> usize {
        self.drafts.push(Schedule {
            course_id: Some(self.course_id.clone()),
            trip_type: TripType::Pickup,
            scheduled_time: DEFAULT_TIME.to_string(),
            route_order: Some(self.drafts.len() as u32 + 1),
            ..Default::default()
        });
        self.drafts.len() - 1
    }

    pub fn remove_row(&mut self, index: usize) -> Result<Schedule, EditorError> {
        if index >= self.drafts.len() {
            return Err(EditorError::RowOutOfRange(index));
        }
        Ok(self.drafts.remove(index))
    }

    /// Edit one cell. Choosing a user or vehicle also fills in its display
    /// name (blank when the id is not in the master).
    pub fn update_row(
        &mut self,
        index: usize,
        field: DraftField,
        value: &str,
        users: &[User],
        vehicles: &[Vehicle],
    ) -> Result<(), EditorError> {
        let row = self
            .drafts
            .get_mut(index)
            .ok_or(EditorError::RowOutOfRange(index))?;

        match field {
            DraftField::Time => {
                let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
                    EditorError::InvalidValue {
                        field: "time",
                        value: value.to_string(),
                    }
                })?;
                row.scheduled_time = time.format("%H:%M").to_string();
            }
            DraftField::Type => {
                row.trip_type = value.parse().map_err(|_| EditorError::InvalidValue {
                    field: "type",
                    value: value.to_string(),
                })?;
            }
            DraftField::User => {
                row.user_id = value.to_string();
                row.user_name = user_name(users, value).unwrap_or_default().to_string();
            }
            DraftField::Vehicle => {
                let vehicle = vehicles.iter().find(|v| v.id == value);
                row.vehicle_id = Some(value.to_string()).filter(|v| !v.is_empty());
                row.vehicle_name = vehicle.map(|v| v.name.clone());
            }
        }
        Ok(())
    }

    /// Every row needs a user and a time.
    pub fn validate(&self) -> Result<(), EditorError> {
        match self
            .drafts
            .iter()
            .position(|s| s.user_id.is_empty() || s.scheduled_time.is_empty())
        {
            Some(index) => Err(EditorError::MissingRequired(index)),
            None => Ok(()),
        }
    }

    /// Rows for `bulkUpdateSchedules`, numbered in display order.
    pub fn to_rows(&self, facility_id: &str) -> Result<Vec<ScheduleRow>, EditorError> {
        self.validate()?;
        Ok(self
            .drafts
            .iter()
            .enumerate()
            .map(|(i, s)| ScheduleRow {
                schedule_id: s.schedule_id.clone(),
                user_id: s.user_id.clone(),
                user_name: s.user_name.clone(),
                trip_type: s.trip_type,
                time: s.scheduled_time.clone(),
                vehicle_id: s.vehicle_id.clone(),
                vehicle_name: s.vehicle_name.clone(),
                route_order: i as u32 + 1,
                facility_id: facility_id.to_string(),
            })
            .collect())
    }

    pub fn to_template_items(&self) -> Vec<TemplateItem> {
        self.drafts
            .iter()
            .enumerate()
            .map(|(i, s)| TemplateItem {
                user_id: s.user_id.clone(),
                trip_type: s.trip_type,
                time: s.scheduled_time.clone(),
                route_order: Some(i as u32 + 1),
            })
            .collect()
    }

    /// Overwrite the course's schedule for the editor's date.
    pub async fn save(&self, api: &ApiClient, courses: &[Course]) -> Result<Value> {
        let facility_id = facility_for_course(courses, &self.course_id);
        let rows = self.to_rows(&facility_id)?;
        info!(course = %self.course_id, date = %self.date, rows = rows.len(), "Saving schedule");
        api.bulk_update_schedules(self.date, &self.course_id, &rows).await
    }

    pub async fn save_as_template(&self, api: &ApiClient, name: &str) -> Result<Value> {
        let items = self.to_template_items();
        info!(course = %self.course_id, name, items = items.len(), "Creating template");
        api.create_template(&self.course_id, name, &items).await
    }

    // ===== Persistence between sessions =====

    pub fn load(storage: &LocalStorage) -> Result<Option<Self>, StoreError> {
        match storage.get_item(EDITOR_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: EDITOR_KEY,
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn persist(&self, storage: &LocalStorage) -> Result<(), StoreError> {
        storage.set_item(EDITOR_KEY, &serde_json::to_string(self)?)
    }

    pub fn discard(storage: &LocalStorage) -> Result<(), StoreError> {
        storage.remove_item(EDITOR_KEY)
    }
}
