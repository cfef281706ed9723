use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::parser::DEFAULT_PATTERN;
use crate::source::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/motionwatch.conf";
const DEFAULT_LOG_LEVEL: &str = "info";
const CAMERA_KEY_PREFIX: &str = "camera.";

/// Runtime configuration.
///
/// Loaded from a `key = value` file, then overridden by `MOTIONWATCH_*`
/// environment variables. Cameras are listed as `camera.<ID> = <label>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_path: Option<PathBuf>,
    pub pattern: String,
    pub poll_interval: Duration,
    pub log_level: String,
    /// Camera ID to human-readable label
    pub cameras: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: None,
            pattern: DEFAULT_PATTERN.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            cameras: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `MOTIONWATCH_CONFIG` /
    /// the default location when `path` is `None`.
    ///
    /// A missing file at the default location is not an error; an
    /// explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::parse(&std::fs::read_to_string(path)?)?,
            None => {
                let path = std::env::var("MOTIONWATCH_CONFIG")
                    .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
                if Path::new(&path).exists() {
                    Self::parse(&std::fs::read_to_string(&path)?)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Parse the contents of a config file.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config.set(key.trim(), value.trim())?;
            }
        }

        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "log_path" => self.log_path = Some(PathBuf::from(value)),
            "pattern" => self.pattern = value.to_string(),
            "poll_interval_ms" => self.poll_interval = parse_millis(key, value)?,
            "log_level" => self.log_level = value.to_string(),
            _ => {
                if let Some(camera_id) = key.strip_prefix(CAMERA_KEY_PREFIX) {
                    if camera_id.is_empty() {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        });
                    }
                    self.cameras.insert(camera_id.to_string(), value.to_string());
                }
            }
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("MOTIONWATCH_LOG_PATH") {
            self.log_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("MOTIONWATCH_PATTERN") {
            self.pattern = val;
        }
        if let Ok(val) = std::env::var("MOTIONWATCH_POLL_MS") {
            self.poll_interval = parse_millis("MOTIONWATCH_POLL_MS", &val)?;
        }
        Ok(())
    }

    /// Filter directive for the tracing subscriber.
    pub fn tracing_filter(&self) -> String {
        format!("motionwatch={}", self.log_level)
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
