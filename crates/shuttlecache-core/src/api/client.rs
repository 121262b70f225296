//! API client for the shuttle backend.
//!
//! This module provides the `ApiClient` struct for reading masters and
//! schedules and for writing check-ins, bulk schedule edits, master edits
//! and templates.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::connectivity::Connectivity;
use crate::models::{
    ApiInfo, BatchResult, Course, Facility, MasterType, PendingRecord, Schedule, ScheduleRow,
    Template, TemplateItem, User, Vehicle,
};
use crate::sync::RecordSender;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// POST bodies go out as text/plain so browsers hitting the same endpoint
/// skip the CORS preflight; the backend parses the body as JSON either way.
const POST_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Response envelope shared by every action.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// API client for the shuttle backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
    connectivity: Connectivity,
}

impl ApiClient {
    /// Create a client for `endpoint`. An empty endpoint is a configuration
    /// error.
    pub fn new(endpoint: impl Into<String>, connectivity: Connectivity) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(ApiError::MissingEndpoint.into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            connectivity,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request built by `build`, failing fast when offline and
    /// retrying rate-limited responses with exponential backoff.
    async fn send(&self, action: &str, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        if self.connectivity.is_offline() {
            return Err(ApiError::Offline.into());
        }

        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = match build().send().await {
                Ok(response) => response,
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        warn!(action, error = %e, "Backend unreachable, marking offline");
                        self.connectivity.set_online(false);
                    }
                    return Err(anyhow::Error::new(ApiError::NetworkError(e))
                        .context(format!("Failed to send {} request", action)));
                }
            };

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(action, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Unwrap a `{success, data|error}` envelope into `T`.
    async fn read_envelope<T: DeserializeOwned>(action: &str, response: Response) -> Result<T> {
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read {} response body", action))?;

        let envelope: Envelope = serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("{} returned non-envelope JSON: {}", action, e))
        })?;

        if !envelope.success {
            return Err(ApiError::rejected(envelope.error).into());
        }

        let data = envelope.data.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse {} data: {}", action, e)).into()
        })
    }

    /// GET `?action=<action>&<params>`.
    async fn fetch<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<T> {
        debug!(action, ?params, "GET");
        let response = self
            .send(action, || {
                self.client
                    .get(&self.endpoint)
                    .query(&[("action", action)])
                    .query(params)
            })
            .await?;
        Self::read_envelope(action, response).await
    }

    /// POST `{action, ...payload}`. `payload` must serialize to a JSON object.
    async fn post<T: DeserializeOwned, B: Serialize>(&self, action: &str, payload: &B) -> Result<T> {
        let mut body = match serde_json::to_value(payload)? {
            Value::Object(map) => map,
            other => {
                return Err(anyhow::anyhow!(
                    "{} payload must be a JSON object, got {}",
                    action,
                    other
                ))
            }
        };
        body.insert("action".to_string(), Value::String(action.to_string()));
        let body = serde_json::to_vec(&body)?;

        debug!(action, bytes = body.len(), "POST");
        let response = self
            .send(action, || {
                self.client
                    .post(&self.endpoint)
                    .header(header::CONTENT_TYPE, POST_CONTENT_TYPE)
                    .body(body.clone())
            })
            .await?;
        Self::read_envelope(action, response).await
    }

    // ===== Masters =====

    pub async fn get_facilities(&self) -> Result<Vec<Facility>> {
        self.fetch("getFacilities", &[]).await
    }

    pub async fn get_courses(&self) -> Result<Vec<Course>> {
        self.fetch("getCourses", &[]).await
    }

    pub async fn get_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.fetch("getVehicles", &[]).await
    }

    pub async fn get_users(&self) -> Result<Vec<User>> {
        self.fetch("getUsers", &[]).await
    }

    /// Write edited master rows. The backend upserts the rows it is given
    /// and never deletes rows that are left out.
    pub async fn update_master_data(
        &self,
        master: MasterType,
        items: &[Map<String, Value>],
    ) -> Result<Value> {
        self.post("updateMasterData", &json!({ "type": master, "items": items }))
            .await
    }

    // ===== Schedules =====

    /// Fetch the schedule for `date`, optionally limited to one facility.
    pub async fn get_schedule(&self, date: NaiveDate, facility_id: Option<&str>) -> Result<Vec<Schedule>> {
        let date = date.format("%Y-%m-%d").to_string();
        let mut params = vec![("date", date.as_str())];
        if let Some(id) = facility_id {
            params.push(("facilityId", id));
        }
        self.fetch("getSchedule", &params).await
    }

    /// Replace a course's schedule for `date` with `schedules`.
    pub async fn bulk_update_schedules(
        &self,
        date: NaiveDate,
        course_id: &str,
        schedules: &[ScheduleRow],
    ) -> Result<Value> {
        let payload = json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "courseId": course_id,
            "schedules": schedules,
        });
        self.post("bulkUpdateSchedules", &payload).await
    }

    // ===== Check-ins =====

    pub async fn check_in(&self, record: &PendingRecord) -> Result<Value> {
        self.post("checkIn", record).await
    }

    /// A success envelope without data means every record was written.
    pub async fn check_in_batch(&self, records: &[PendingRecord]) -> Result<BatchResult> {
        let result: Option<BatchResult> =
            self.post("checkInBatch", &json!({ "records": records })).await?;
        Ok(result.unwrap_or_default())
    }

    // ===== Templates =====

    pub async fn get_templates(&self, course_id: Option<&str>) -> Result<Vec<Template>> {
        match course_id {
            Some(id) => self.fetch("getTemplates", &[("courseId", id)]).await,
            None => self.fetch("getTemplates", &[]).await,
        }
    }

    pub async fn create_template(
        &self,
        course_id: &str,
        template_name: &str,
        items: &[TemplateItem],
    ) -> Result<Value> {
        let payload = json!({
            "courseId": course_id,
            "templateName": template_name,
            "items": items,
        });
        self.post("createTemplate", &payload).await
    }

    /// Let the backend expand a template into the schedule for `date`.
    pub async fn register_schedule_from_template(
        &self,
        template_id: &str,
        date: NaiveDate,
        vehicle_id: Option<&str>,
    ) -> Result<Value> {
        let payload = json!({
            "templateId": template_id,
            "date": date.format("%Y-%m-%d").to_string(),
            "vehicleId": vehicle_id,
        });
        self.post("registerScheduleFromTemplate", &payload).await
    }

    // ===== Meta =====

    pub async fn get_api_info(&self) -> Result<ApiInfo> {
        self.fetch("getApiInfo", &[]).await
    }

    /// Ask for `getApiInfo` while ignoring the offline flag. Returns whether
    /// the backend answered; the flag itself is left for the caller.
    pub async fn probe(&self) -> bool {
        let result = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "getApiInfo")])
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl RecordSender for ApiClient {
    async fn send_batch(&self, records: &[PendingRecord]) -> Result<BatchResult> {
        self.check_in_batch(records).await
    }

    async fn probe(&self) -> bool {
        ApiClient::probe(self).await
    }
}
