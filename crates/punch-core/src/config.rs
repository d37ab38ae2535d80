//! Kiosk configuration shared by `punchd` and the `punch` CLI.

use crate::camera::StreamConstraints;
use crate::workflow::WorkflowOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Kiosk configuration.
///
/// Defaults, then the TOML file at `PUNCH_CONFIG` (or
/// `$XDG_CONFIG_HOME/punchclock/kiosk.toml`), then `PUNCH_*` variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the store API, without a trailing `/api`.
    pub api_base_url: String,
    /// V4L2 device path.
    pub camera_device: String,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// JSON session written by the store login.
    pub session_path: PathBuf,
    pub request_timeout_secs: u64,
    /// How long a result or error stays up before returning to idle. 0 disables.
    pub result_display_secs: u64,
    pub jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            camera_device: "/dev/video0".to_string(),
            capture_width: 640,
            capture_height: 480,
            model_dir: data_dir.join("models"),
            session_path: data_dir.join("session.json"),
            request_timeout_secs: 15,
            result_display_secs: 8,
            jpeg_quality: 80,
        }
    }
}

impl Config {
    /// Load from the config file (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("PUNCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("kiosk.toml"));
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `PUNCH_*` overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PUNCH_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("PUNCH_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("PUNCH_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PUNCH_SESSION_PATH") {
            self.session_path = PathBuf::from(v);
        }
        override_parsed(&lookup, "PUNCH_CAPTURE_WIDTH", &mut self.capture_width);
        override_parsed(&lookup, "PUNCH_CAPTURE_HEIGHT", &mut self.capture_height);
        override_parsed(&lookup, "PUNCH_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        override_parsed(&lookup, "PUNCH_RESULT_DISPLAY_SECS", &mut self.result_display_secs);
        override_parsed(&lookup, "PUNCH_JPEG_QUALITY", &mut self.jpeg_quality);
    }

    pub fn workflow_options(&self) -> WorkflowOptions {
        WorkflowOptions {
            constraints: StreamConstraints {
                width: self.capture_width,
                height: self.capture_height,
            },
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn result_display(&self) -> Duration {
        Duration::from_secs(self.result_display_secs)
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable override"),
    }
}

fn home_relative(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(fallback)
    })
}

fn data_dir() -> PathBuf {
    home_relative("XDG_DATA_HOME", ".local/share").join("punchclock")
}

fn config_dir() -> PathBuf {
    home_relative("XDG_CONFIG_HOME", ".config").join("punchclock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!((config.capture_width, config.capture_height), (640, 480));
        assert!(config.model_dir.ends_with("punchclock/models"));
        assert_eq!(config.result_display(), Duration::from_secs(8));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            api_base_url = "https://store.example.com"
            camera_device = "/dev/video2"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url, "https://store.example.com");
        assert_eq!(config.camera_device, "/dev/video2");
        assert_eq!(config.request_timeout_secs, 15);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PUNCH_CAMERA_DEVICE", "/dev/video4"),
            ("PUNCH_CAPTURE_WIDTH", "1280"),
            ("PUNCH_JPEG_QUALITY", "not-a-number"),
            ("PUNCH_RESULT_DISPLAY_SECS", "0"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.camera_device, "/dev/video4");
        assert_eq!(config.capture_width, 1280);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.result_display_secs, 0);
    }

    #[test]
    fn test_workflow_options() {
        let config = Config {
            capture_width: 320,
            capture_height: 240,
            jpeg_quality: 0,
            ..Config::default()
        };
        let options = config.workflow_options();
        assert_eq!((options.constraints.width, options.constraints.height), (320, 240));
        assert_eq!(options.jpeg_quality, 1);
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/punchclock/kiosk.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_from_file_invalid() {
        let path = std::env::temp_dir().join(format!("punchclock-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "request_timeout_secs = \"soon\"").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
