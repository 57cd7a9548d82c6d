//! Configuration management for taskpro.
//!
//! Configuration can be set via environment variables:
//! - `TASKPRO_DATA_DIR` - Optional. Directory holding `tasks.json` and `preferences.json`. Defaults to `./.taskpro`.
//! - `TASKPRO_SCAN_INTERVAL_SECS` - Optional. Seconds between reminder scans. Defaults to `3600`.
//! - `TASKPRO_RETRY_INTERVAL_SECS` - Optional. Seconds before retrying after a failed scan. Defaults to `300`.
//! - `TASKPRO_SCAN_TIMEOUT_SECS` - Optional. Upper bound on a single scan. Defaults to `30`.
//! - `TASKPRO_SHUTDOWN_GRACE_MS` - Optional. How long shutdown waits for an in-flight scan. Defaults to `500`.
//! - `TASKPRO_NOTIFICATIONS` - Optional. Set to `0`/`false` to discard reminders. Defaults to `true`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::util::env_var_bool;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Reminder scheduler timing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderConfig {
    /// Normal cadence between scans
    pub scan_interval: Duration,

    /// Shortened cadence after a failed scan
    pub retry_interval: Duration,

    /// A scan that takes longer than this counts as failed
    pub scan_timeout: Duration,

    /// How long shutdown waits for an in-flight scan before abandoning it
    pub shutdown_grace: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(3600),
            retry_interval: Duration::from_secs(300),
            scan_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory for the task store and preferences
    pub data_dir: PathBuf,

    /// Whether reminders reach the notification sink
    pub notifications_enabled: bool,

    pub reminder: ReminderConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for non-numeric or zero durations.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var("TASKPRO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(".taskpro")
            });

        let defaults = ReminderConfig::default();
        let reminder = ReminderConfig {
            scan_interval: duration_var(
                "TASKPRO_SCAN_INTERVAL_SECS",
                defaults.scan_interval,
                Duration::from_secs,
            )?,
            retry_interval: duration_var(
                "TASKPRO_RETRY_INTERVAL_SECS",
                defaults.retry_interval,
                Duration::from_secs,
            )?,
            scan_timeout: duration_var(
                "TASKPRO_SCAN_TIMEOUT_SECS",
                defaults.scan_timeout,
                Duration::from_secs,
            )?,
            shutdown_grace: duration_var(
                "TASKPRO_SHUTDOWN_GRACE_MS",
                defaults.shutdown_grace,
                Duration::from_millis,
            )?,
        };

        Ok(Self {
            data_dir,
            notifications_enabled: env_var_bool("TASKPRO_NOTIFICATIONS", true),
            reminder,
        })
    }

    /// Create a config rooted at `data_dir` with default timings (useful for testing).
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            notifications_enabled: true,
            reminder: ReminderConfig::default(),
        }
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }
}

fn duration_var(
    name: &str,
    default: Duration,
    unit: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => parse_duration(name, &raw, unit),
        Err(_) => Ok(default),
    }
}

fn parse_duration(
    name: &str,
    raw: &str,
    unit: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(unit(value))
}
