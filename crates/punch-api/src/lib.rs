//! punch-api: HTTP client for the `/api/face/*` and `/api/timeclock/*` endpoints.
//!
//! Response interpretation is kept in plain functions over `(status, body)`
//! so it can be exercised without a server.

use chrono::{DateTime, Utc};
use punch_core::api::{
    AddAppearanceRequest, ApiError, AppearanceReceipt, ClockReceipt, ClockRequest, RecognizeRequest,
    Recognition, RegisterReceipt, RegisterRequest, TimeclockApi,
};
use punch_core::time::parse_server_time;
use punch_core::Session;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Status code and parsed JSON body of one response. Non-JSON bodies become `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Human-readable failure text: the API's `error` field verbatim, then
/// `message`, then a generic status line.
pub fn error_message(status: u16, body: &Value) -> String {
    ["error", "message"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {status}"))
}

fn into_result<T: DeserializeOwned>(reply: Reply) -> Result<T, ApiError> {
    if !reply.is_success() {
        return Err(ApiError::Status {
            status: reply.status,
            message: error_message(reply.status, &reply.body),
        });
    }
    serde_json::from_value(reply.body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Ids come back as strings from some endpoints and numbers from others.
fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

fn server_time(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_server_time(raw).map_err(|e| ApiError::Decode(format!("bad timestamp {raw:?}: {e}")))
}

#[derive(Deserialize)]
struct MatchBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, deserialize_with = "flexible_id")]
    employee_id: String,
    #[serde(default)]
    employee_name: String,
    #[serde(default)]
    confidence: f64,
}

/// `/api/face/recognize` answers a non-match with 404 and a JSON body carrying
/// `success: false` or an `error` text. Any other 404 (a wrong base URL, say)
/// is a plain status failure.
pub fn interpret_recognition(reply: Reply) -> Result<Recognition, ApiError> {
    if reply.status == 404 && is_no_match_body(&reply.body) {
        return Ok(Recognition::NotRecognized {
            message: error_message(reply.status, &reply.body),
        });
    }
    let fallback = error_message(reply.status, &reply.body);
    let body: MatchBody = into_result(reply)?;
    if body.success == Some(false) {
        return Ok(Recognition::NotRecognized { message: fallback });
    }
    Ok(Recognition::Matched {
        employee_id: body.employee_id,
        employee_name: body.employee_name,
        confidence: body.confidence,
    })
}

fn is_no_match_body(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool) == Some(false)
        || body.get("error").is_some_and(Value::is_string)
}

#[derive(Deserialize)]
struct ClockBody {
    employee_name: String,
    clock_in_time: String,
    #[serde(default)]
    clock_out_time: Option<String>,
    #[serde(default)]
    hours_worked: Option<serde_json::Number>,
    #[serde(default)]
    confidence: Option<f64>,
}

pub fn interpret_clock_in(reply: Reply) -> Result<ClockReceipt, ApiError> {
    let body: ClockBody = into_result(reply)?;
    Ok(ClockReceipt::In {
        clock_in: server_time(&body.clock_in_time)?,
        employee_name: body.employee_name,
        confidence: body.confidence,
    })
}

pub fn interpret_clock_out(reply: Reply) -> Result<ClockReceipt, ApiError> {
    let body: ClockBody = into_result(reply)?;
    let clock_out = body
        .clock_out_time
        .as_deref()
        .ok_or_else(|| ApiError::Decode("clock-out response without clock_out_time".into()))?;
    Ok(ClockReceipt::Out {
        clock_in: server_time(&body.clock_in_time)?,
        clock_out: server_time(clock_out)?,
        hours_worked: body
            .hours_worked
            .ok_or_else(|| ApiError::Decode("clock-out response without hours_worked".into()))?,
        employee_name: body.employee_name,
        confidence: body.confidence,
    })
}

#[derive(Deserialize)]
struct AppearanceBody {
    message: String,
    employee_name: String,
    #[serde(default)]
    total_registrations: Option<u32>,
}

pub fn interpret_appearance(reply: Reply) -> Result<AppearanceReceipt, ApiError> {
    let body: AppearanceBody = into_result(reply)?;
    Ok(AppearanceReceipt {
        message: body.message,
        employee_name: body.employee_name,
        total_registrations: body.total_registrations,
    })
}

#[derive(Deserialize)]
struct RegisterBody {
    message: String,
    #[serde(deserialize_with = "flexible_id")]
    employee_id: String,
    employee_name: String,
}

pub fn interpret_register(reply: Reply) -> Result<RegisterReceipt, ApiError> {
    let body: RegisterBody = into_result(reply)?;
    Ok(RegisterReceipt {
        message: body.message,
        employee_id: body.employee_id,
        employee_name: body.employee_name,
    })
}

/// Face registration status of one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceStatus {
    #[serde(deserialize_with = "flexible_id")]
    pub employee_id: String,
    pub employee_name: String,
    pub face_registered: bool,
    #[serde(default)]
    pub has_face_image: bool,
    #[serde(default)]
    pub face_registrations_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    ClockedIn,
    ClockedOut,
}

#[derive(Deserialize)]
struct EntryBody {
    #[serde(deserialize_with = "flexible_id")]
    entry_id: String,
    #[serde(deserialize_with = "flexible_id")]
    employee_id: String,
    employee_name: String,
    store_id: String,
    clock_in: Option<String>,
    clock_out: Option<String>,
    hours_worked: Option<serde_json::Number>,
    status: EntryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEntry {
    pub entry_id: String,
    pub employee_id: String,
    pub employee_name: String,
    pub store_id: String,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub hours_worked: Option<serde_json::Number>,
    pub status: EntryStatus,
}

#[derive(Deserialize)]
struct TodayBody {
    date: String,
    store_id: String,
    employees: Vec<EntryBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayEntries {
    pub date: String,
    pub store_id: String,
    pub entries: Vec<TimeEntry>,
}

pub fn interpret_today(reply: Reply) -> Result<TodayEntries, ApiError> {
    let body: TodayBody = into_result(reply)?;
    let entries = body
        .employees
        .into_iter()
        .map(|e| {
            Ok(TimeEntry {
                clock_in: e.clock_in.as_deref().map(server_time).transpose()?,
                clock_out: e.clock_out.as_deref().map(server_time).transpose()?,
                entry_id: e.entry_id,
                employee_id: e.employee_id,
                employee_name: e.employee_name,
                store_id: e.store_id,
                hours_worked: e.hours_worked,
                status: e.status,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;
    Ok(TodayEntries {
        date: body.date,
        store_id: body.store_id,
        entries,
    })
}

/// `reqwest`-backed [`TimeclockApi`] authenticated with the session's bearer token.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpApi {
    pub fn new(base_url: &str, session: &Session, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: session.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn face_status(&self, employee_id: &str) -> Result<FaceStatus, ApiError> {
        let reply = self.get(&format!("/api/face/employees/{employee_id}"), &[]).await?;
        into_result(reply)
    }

    pub async fn today(&self, store_id: &str) -> Result<TodayEntries, ApiError> {
        let reply = self.get("/api/timeclock/today", &[("store_id", store_id)]).await?;
        interpret_today(reply)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Reply, ApiError> {
        tracing::debug!(path, "POST");
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::read(path, response).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Reply, ApiError> {
        tracing::debug!(path, "GET");
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::read(path, response).await
    }

    async fn read(path: &str, response: reqwest::Response) -> Result<Reply, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        if !(200..300).contains(&status) {
            tracing::warn!(path, status, "API returned an error");
        }
        Ok(Reply { status, body })
    }
}

impl TimeclockApi for HttpApi {
    async fn recognize(&self, request: &RecognizeRequest) -> Result<Recognition, ApiError> {
        interpret_recognition(self.post("/api/face/recognize", request).await?)
    }

    async fn clock_in(&self, request: &ClockRequest) -> Result<ClockReceipt, ApiError> {
        interpret_clock_in(self.post("/api/timeclock/clock-in-face", request).await?)
    }

    async fn clock_out(&self, request: &ClockRequest) -> Result<ClockReceipt, ApiError> {
        interpret_clock_out(self.post("/api/timeclock/clock-out-face", request).await?)
    }

    async fn add_appearance(&self, request: &AddAppearanceRequest) -> Result<AppearanceReceipt, ApiError> {
        interpret_appearance(self.post("/api/face/add-appearance", request).await?)
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterReceipt, ApiError> {
        interpret_register(self.post("/api/face/register", request).await?)
    }
}
