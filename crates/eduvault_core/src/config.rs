//! Application configuration.
//!
//! # Responsibility
//! - Describe planner tuning, logging and storage selection in one document.
//! - Load the document from JSON, falling back to defaults when absent.
//!
//! # Invariants
//! - A loaded config has passed `AppConfig::validate()`.
//! - Unknown fields are rejected so typos do not silently fall back.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_NOTIFICATION_CAPACITY: usize = 50;
const DEFAULT_LOCAL_STORE_FILE: &str = "eduvault-tasks.json";
const MAX_GRACE_MINUTES: u32 = 30;
const MAX_RETRY_DELAY_SECS: u64 = 24 * 3600;

/// Error loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub planner: PlannerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planner.validate()?;
        if let StorageConfig::Hosted { user_id, .. } = &self.storage {
            if user_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.user_id cannot be empty in hosted mode".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Session clock and task service tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Period between session clock ticks.
    pub tick_interval_ms: u64,
    /// Extra whole minutes after a task's start minute during which a
    /// delayed tick may still start it. `0` means exact-minute matching.
    pub start_grace_minutes: u32,
    pub retry: RetryPolicy,
    /// Maximum notifications retained by the notification center.
    pub notification_capacity: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            start_grace_minutes: 0,
            retry: RetryPolicy::default(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl PlannerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "planner.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.start_grace_minutes > MAX_GRACE_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "planner.start_grace_minutes cannot exceed {MAX_GRACE_MINUTES}"
            )));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::Invalid(
                "planner.notification_capacity must be greater than zero".to_string(),
            ));
        }
        self.retry.validate()
    }
}

/// Backoff policy for replaying failed task writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts including the initial write.
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 2,
            max_delay_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `failed_attempts` failures.
    ///
    /// Doubles from `base_delay_secs` and saturates at `max_delay_secs`.
    pub fn delay_after(&self, failed_attempts: u32) -> chrono::Duration {
        let exponent = failed_attempts.saturating_sub(1).min(30);
        let secs = self
            .base_delay_secs
            .saturating_mul(1_u64 << exponent)
            .min(self.max_delay_secs)
            .min(MAX_RETRY_DELAY_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "planner.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay_secs > self.max_delay_secs {
            return Err(ConfigError::Invalid(
                "planner.retry.base_delay_secs cannot exceed max_delay_secs".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files. `None` disables file logs.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Task store selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Single-user offline JSON document.
    Local { path: PathBuf },
    /// Per-user rows in a SQLite task database.
    Hosted { db_path: PathBuf, user_id: String },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from(DEFAULT_LOCAL_STORE_FILE),
        }
    }
}

/// Loads and validates configuration from a JSON file.
///
/// A missing file yields `AppConfig::default()`.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let config = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppConfig>(&raw).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?,
        Err(err) if err.kind() == ErrorKind::NotFound => AppConfig::default(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.validate()?;
    Ok(config)
}
