//! Back-office operations: course progress, the schedule editor, template
//! registration and master maintenance.

pub mod dashboard;
pub mod editor;
pub mod master;

pub use dashboard::{course_progress, CourseProgress};
pub use editor::{DraftField, EditorError, ScheduleEditor};
pub use master::{cell_display, MasterError, MasterRow, MasterTable};

use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use crate::data::{DataManager, InitReport};

/// Expand several templates into `date` at once. Results come back in the
/// order the ids were given.
pub async fn register_from_templates(
    data: &DataManager,
    template_ids: &[String],
    date: NaiveDate,
    vehicle_id: Option<&str>,
) -> Vec<(String, Result<Value>)> {
    let api = data.api();
    let futures = template_ids
        .iter()
        .map(|id| api.register_schedule_from_template(id, date, vehicle_id));
    let results = join_all(futures).await;

    template_ids
        .iter()
        .cloned()
        .zip(results)
        .inspect(|(id, result)| match result {
            Ok(_) => info!(template = %id, %date, "Registered schedule from template"),
            Err(e) => warn!(template = %id, error = %e, "Template registration failed"),
        })
        .collect()
}

/// Save a master table, then reload every master so ids assigned by the
/// backend show up.
pub async fn save_master(data: &DataManager, table: &MasterTable) -> Result<InitReport> {
    table.save(data.api()).await?;
    data.init_admin().await
}
