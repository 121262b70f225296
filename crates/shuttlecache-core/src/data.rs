//! Fetching masters and schedules into the store.
//!
//! Every fetch is applied on its own: one failing endpoint never discards
//! what the others returned, and a failure leaves the cached copy in place.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::models::Template;
use crate::store::Store;

/// Which schedules `load_schedule` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleScope {
    /// Only the current facility (driver view).
    CurrentFacility,
    /// Every facility (admin view).
    AllFacilities,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Fresh { count: usize },
    /// The fetch failed; the cached schedules were kept.
    Cached { count: usize, error: String },
}

/// Which masters were refreshed and which kept their cached copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub loaded: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl InitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn settle<T>(&mut self, name: &'static str, result: Result<Vec<T>>, slot: &mut Vec<T>) {
        match result {
            Ok(items) => {
                debug!(name, count = items.len(), "Fetched");
                *slot = items;
                self.loaded.push(name);
            }
            Err(e) => {
                warn!(name, error = %e, "Fetch failed, keeping cached data");
                self.failed.push((name, format!("{:#}", e)));
            }
        }
    }
}

pub struct DataManager {
    store: Arc<Mutex<Store>>,
    api: ApiClient,
    fallback_facility: Option<String>,
}

impl DataManager {
    pub fn new(store: Arc<Mutex<Store>>, api: ApiClient) -> Self {
        Self {
            store,
            api,
            fallback_facility: None,
        }
    }

    /// Facility to select when none is selected and none is marked default.
    pub fn with_fallback_facility(mut self, facility_id: Option<String>) -> Self {
        self.fallback_facility = facility_id;
        self
    }

    pub fn store(&self) -> &Arc<Mutex<Store>> {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Driver start-up: facilities, then vehicles.
    pub async fn init_driver(&self) -> Result<InitReport> {
        let mut report = InitReport::default();

        let facilities = self.api.get_facilities().await;
        let vehicles = self.api.get_vehicles().await;

        let mut store = self.store.lock().await;
        report.settle("facilities", facilities, &mut store.data.facilities);
        report.settle("vehicles", vehicles, &mut store.data.vehicles);
        self.finish_init(&mut store, &report)?;

        info!(loaded = report.loaded.len(), failed = report.failed.len(), "Driver data loaded");
        Ok(report)
    }

    /// Admin start-up: facilities and courses together, then vehicles and
    /// users together.
    pub async fn init_admin(&self) -> Result<InitReport> {
        let mut report = InitReport::default();

        let (facilities, courses) = tokio::join!(self.api.get_facilities(), self.api.get_courses());
        {
            let mut store = self.store.lock().await;
            report.settle("facilities", facilities, &mut store.data.facilities);
            report.settle("courses", courses, &mut store.data.courses);
        }

        let (vehicles, users) = tokio::join!(self.api.get_vehicles(), self.api.get_users());
        let mut store = self.store.lock().await;
        report.settle("vehicles", vehicles, &mut store.data.vehicles);
        report.settle("users", users, &mut store.data.users);
        self.finish_init(&mut store, &report)?;

        info!(loaded = report.loaded.len(), failed = report.failed.len(), "Admin data loaded");
        Ok(report)
    }

    fn finish_init(&self, store: &mut Store, report: &InitReport) -> Result<()> {
        if !store.apply_default_facility() && store.status.current_facility.is_none() {
            store.status.current_facility = self.fallback_facility.clone();
        }
        if !report.loaded.is_empty() {
            store.status.last_refreshed = Some(Utc::now());
        }
        store.status.is_offline = self.api.connectivity().is_offline();
        store.save()?;
        Ok(())
    }

    /// Fetch the schedule for the current date. On failure the cached
    /// schedules stay and the outcome says so.
    pub async fn load_schedule(&self, scope: ScheduleScope) -> Result<LoadOutcome> {
        let (date, facility) = {
            let store = self.store.lock().await;
            let facility = match scope {
                ScheduleScope::CurrentFacility => store.status.current_facility.clone(),
                ScheduleScope::AllFacilities => None,
            };
            (store.status.current_date, facility)
        };

        let result = self.api.get_schedule(date, facility.as_deref()).await;

        let mut store = self.store.lock().await;
        match result {
            Ok(schedules) => {
                let count = schedules.len();
                info!(%date, count, "Schedule loaded");
                store.data.schedules = schedules;
                store.save()?;
                Ok(LoadOutcome::Fresh { count })
            }
            Err(e) => {
                warn!(%date, error = %e, "Schedule fetch failed, showing cached");
                Ok(LoadOutcome::Cached {
                    count: store.data.schedules.len(),
                    error: format!("{:#}", e),
                })
            }
        }
    }

    /// Fetch templates, optionally for one course, and cache them.
    pub async fn load_templates(&self, course_id: Option<&str>) -> Result<Vec<Template>> {
        let templates = self.api.get_templates(course_id).await?;
        let mut store = self.store.lock().await;
        store.data.templates = templates.clone();
        store.save()?;
        Ok(templates)
    }
}
