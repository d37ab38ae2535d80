//! Remote timeclock API capability and its request/response types.

use crate::types::{Capture, FaceDescriptor};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    /// Non-success response; `message` is the API's own `error` text.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizeRequest {
    pub face_descriptor: FaceDescriptor,
    pub store_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockRequest {
    pub face_descriptor: FaceDescriptor,
    pub face_image: String,
    pub store_id: String,
}

impl ClockRequest {
    pub fn from_capture(capture: &Capture, store_id: &str) -> Self {
        Self {
            face_descriptor: capture.descriptor.clone(),
            face_image: capture.frame.data_url.clone(),
            store_id: store_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddAppearanceRequest {
    pub employee_name: String,
    pub face_descriptor: FaceDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub employee_id: String,
    pub face_descriptor: FaceDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_image: Option<String>,
}

/// Outcome of a recognition call. A non-match is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Matched {
        employee_id: String,
        employee_name: String,
        confidence: f64,
    },
    NotRecognized {
        message: String,
    },
}

/// Committed clock action as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockReceipt {
    In {
        employee_name: String,
        clock_in: DateTime<Utc>,
        confidence: Option<f64>,
    },
    Out {
        employee_name: String,
        clock_in: DateTime<Utc>,
        clock_out: DateTime<Utc>,
        /// Kept as the server's JSON number so it displays exactly as sent.
        hours_worked: serde_json::Number,
        confidence: Option<f64>,
    },
}

impl ClockReceipt {
    pub fn employee_name(&self) -> &str {
        match self {
            Self::In { employee_name, .. } | Self::Out { employee_name, .. } => employee_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppearanceReceipt {
    pub message: String,
    pub employee_name: String,
    pub total_registrations: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterReceipt {
    pub message: String,
    pub employee_id: String,
    pub employee_name: String,
}

/// The `/api/face/*` and `/api/timeclock/*` calls the workflow depends on.
pub trait TimeclockApi: Send + Sync {
    fn recognize(
        &self,
        request: &RecognizeRequest,
    ) -> impl Future<Output = Result<Recognition, ApiError>> + Send;

    fn clock_in(
        &self,
        request: &ClockRequest,
    ) -> impl Future<Output = Result<ClockReceipt, ApiError>> + Send;

    fn clock_out(
        &self,
        request: &ClockRequest,
    ) -> impl Future<Output = Result<ClockReceipt, ApiError>> + Send;

    fn add_appearance(
        &self,
        request: &AddAppearanceRequest,
    ) -> impl Future<Output = Result<AppearanceReceipt, ApiError>> + Send;

    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<RegisterReceipt, ApiError>> + Send;
}
