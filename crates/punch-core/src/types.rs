use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Number of dimensions in a face descriptor.
pub const DESCRIPTOR_LEN: usize = 128;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("expected {DESCRIPTOR_LEN}-dim descriptor, got {0}")]
    WrongLength(usize),
    #[error("descriptor contains a non-finite value at index {0}")]
    NonFinite(usize),
}

/// Face embedding produced by the face model.
///
/// Serializes as a bare JSON array of numbers, which is what the remote API
/// expects in `face_descriptor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FaceDescriptor {
    values: Vec<f32>,
}

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Result<Self, DescriptorError> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(DescriptorError::WrongLength(values.len()));
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(DescriptorError::NonFinite(idx));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

impl TryFrom<Vec<f32>> for FaceDescriptor {
    type Error = DescriptorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FaceDescriptor> for Vec<f32> {
    fn from(descriptor: FaceDescriptor) -> Self {
        descriptor.values
    }
}

/// Still image snapshotted from the live camera feed, as a JPEG data URL.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

/// A descriptor and the frame it was extracted from, produced by one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub descriptor: FaceDescriptor,
    pub frame: CapturedFrame,
}

/// Which time clock action the workflow was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockAction {
    ClockIn,
    ClockOut,
}

impl ClockAction {
    /// Human wording used in status text ("clock in", "clock out").
    pub fn verb(self) -> &'static str {
        match self {
            Self::ClockIn => "clock in",
            Self::ClockOut => "clock out",
        }
    }
}

impl fmt::Display for ClockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClockIn => "clock-in",
            Self::ClockOut => "clock-out",
        })
    }
}

impl FromStr for ClockAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "clock-in" | "in" => Ok(Self::ClockIn),
            "clock-out" | "out" => Ok(Self::ClockOut),
            other => Err(format!("unknown clock action: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Store,
    Manager,
    SuperAdmin,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session file not found: {0} — log in from the store dashboard first")]
    NotFound(String),
    #[error("failed to read session: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed session: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Logged-in identity persisted by the auth layer.
///
/// For a store session `identity` is the store id sent with every
/// recognition and clock request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub role: Role,
    pub identity: String,
    pub token: String,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        if !path.exists() {
            return Err(SessionError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Store id for clocking, if this is a store session.
    pub fn store_id(&self) -> Option<&str> {
        match self.role {
            Role::Store => Some(&self.identity),
            _ => None,
        }
    }
}
