//! Editable master tables.
//!
//! Rows are kept as raw column maps so columns the table does not know
//! about travel back to the backend untouched.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::api::ApiClient;
use crate::models::{FieldKind, MasterType, ACTIVE_FIELD};
use crate::store::StoreData;

#[derive(Error, Debug)]
pub enum MasterError {
    #[error("{0} is already saved; clear 有効 to deactivate it instead of deleting")]
    ExistingRow(String),

    #[error("No row {0}")]
    RowOutOfRange(usize),

    #[error("{0} is assigned by the backend and cannot be edited")]
    ReadOnly(&'static str),

    #[error("Unknown column for {master}: {key}")]
    UnknownField { master: MasterType, key: String },

    #[error("Invalid number for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    /// Backend id; `None` for rows added in this session.
    pub id: Option<String>,
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterTable {
    master: MasterType,
    rows: Vec<MasterRow>,
}

/// Render a cell for display.
pub fn cell_display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "✓".to_string(),
        Some(Value::Bool(false)) => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

fn id_of(values: &Map<String, Value>, id_field: &str) -> Option<String> {
    match values.get(id_field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_maps<T: Serialize>(items: &[T]) -> Result<Vec<Map<String, Value>>> {
    items
        .iter()
        .map(|item| match serde_json::to_value(item)? {
            Value::Object(map) => Ok(map),
            other => Err(anyhow::anyhow!("master row is not an object: {}", other)),
        })
        .collect()
}

impl MasterTable {
    pub fn from_items(master: MasterType, items: Vec<Map<String, Value>>) -> Self {
        let id_field = master.id_field();
        let rows = items
            .into_iter()
            .map(|mut values| {
                let id = id_of(&values, id_field);
                values.remove(id_field);
                MasterRow { id, values }
            })
            .collect();
        Self { master, rows }
    }

    /// Build the table from the cached master.
    pub fn from_store(master: MasterType, data: &StoreData) -> Result<Self> {
        let items = match master {
            MasterType::User => to_maps(&data.users)?,
            MasterType::Vehicle => to_maps(&data.vehicles)?,
            MasterType::Course => to_maps(&data.courses)?,
            MasterType::Facility => to_maps(&data.facilities)?,
        };
        Ok(Self::from_items(master, items))
    }

    pub fn master(&self) -> MasterType {
        self.master
    }

    pub fn rows(&self) -> &[MasterRow] {
        &self.rows
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id.as_deref() == Some(id))
    }

    /// Insert a blank, active row at the top. Returns its index.
    pub fn add_row(&mut self) -> usize {
        let mut values = Map::new();
        values.insert(ACTIVE_FIELD.to_string(), Value::Bool(true));
        self.rows.insert(0, MasterRow { id: None, values });
        0
    }

    /// Drop a row added in this session. Saved rows cannot be removed.
    pub fn remove_row(&mut self, index: usize) -> Result<MasterRow, MasterError> {
        let row = self.rows.get(index).ok_or(MasterError::RowOutOfRange(index))?;
        if let Some(id) = &row.id {
            return Err(MasterError::ExistingRow(id.clone()));
        }
        Ok(self.rows.remove(index))
    }

    /// Set a column from user input, typed by the column's kind.
    pub fn set(&mut self, index: usize, key: &str, raw: &str) -> Result<(), MasterError> {
        let field = self
            .master
            .field(key)
            .ok_or_else(|| MasterError::UnknownField {
                master: self.master,
                key: key.to_string(),
            })?;
        if field.readonly {
            return Err(MasterError::ReadOnly(field.key));
        }

        let value = match field.kind {
            FieldKind::Text | FieldKind::FacilitySelect => Value::String(raw.to_string()),
            FieldKind::Checkbox => Value::Bool(matches!(
                raw.trim().to_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )),
            FieldKind::Number if raw.trim().is_empty() => Value::String(String::new()),
            FieldKind::Number => {
                let n: u32 = raw.trim().parse().map_err(|_| MasterError::InvalidNumber {
                    key: field.key,
                    value: raw.to_string(),
                })?;
                Value::from(n)
            }
        };

        let row = self
            .rows
            .get_mut(index)
            .ok_or(MasterError::RowOutOfRange(index))?;
        row.values.insert(field.key.to_string(), value);
        Ok(())
    }

    /// Rows as sent to `updateMasterData`; new rows carry no id.
    pub fn to_items(&self) -> Vec<Map<String, Value>> {
        let id_field = self.master.id_field();
        self.rows
            .iter()
            .map(|row| {
                let mut item = row.values.clone();
                if let Some(id) = &row.id {
                    item.insert(id_field.to_string(), Value::String(id.clone()));
                }
                item
            })
            .collect()
    }

    /// Post every row. The backend upserts and never deletes.
    pub async fn save(&self, api: &ApiClient) -> Result<Value> {
        let items = self.to_items();
        info!(master = %self.master, rows = items.len(), "Saving master");
        api.update_master_data(self.master, &items).await
    }
}
