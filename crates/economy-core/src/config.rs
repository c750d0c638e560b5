//! Configuration loading and typed config structures for the season economy.
//!
//! The canonical configuration lives in `economy-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file and validates the
//! calibration before anything else starts.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use economy_types::{CalibrationError, CalibrationParams};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The calibration section failed validation.
    #[error("invalid calibration: {source}")]
    Calibration {
        /// The underlying validation error.
        #[from]
        source: CalibrationError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level economy configuration.
///
/// Mirrors the structure of `economy-config.yaml`. All fields have
/// defaults, so an empty file yields a runnable configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EconomyConfig {
    /// Season timeline.
    #[serde(default)]
    pub season: SeasonConfig,

    /// Calibration constants for the current season.
    #[serde(default)]
    pub calibration: CalibrationParams,

    /// Background job intervals.
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Notification queue settings.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Season simulator settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl EconomyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Calibration`] if the calibration is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Calibration`] if the calibration is invalid.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml treats an empty document as a unit value, not an empty map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.calibration.validate()?;
        Ok(config)
    }
}

/// Season timeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeasonConfig {
    /// Wall-clock instant the season started (RFC 3339).
    #[serde(default = "default_season_start")]
    pub start: DateTime<Utc>,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            start: default_season_start(),
        }
    }
}

/// Background job intervals.
///
/// Emission and market regulation always run once per minute: their
/// formulas are defined per minute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobsConfig {
    /// Seconds between invariant watchdog checks.
    #[serde(default = "default_watchdog_interval_seconds")]
    pub watchdog_interval_seconds: u64,

    /// Seconds between ledger snapshot writes.
    #[serde(default = "default_persistence_interval_seconds")]
    pub persistence_interval_seconds: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_seconds: default_watchdog_interval_seconds(),
            persistence_interval_seconds: default_persistence_interval_seconds(),
        }
    }
}

/// Notification queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationConfig {
    /// Maximum notifications waiting for delivery.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Dedup window for market pressure threshold alerts.
    #[serde(default = "default_pressure_alert_dedup_seconds")]
    pub pressure_alert_dedup_seconds: u64,

    /// Dedup window for ledger invariant alerts.
    #[serde(default = "default_invariant_alert_dedup_seconds")]
    pub invariant_alert_dedup_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            pressure_alert_dedup_seconds: default_pressure_alert_dedup_seconds(),
            invariant_alert_dedup_seconds: default_invariant_alert_dedup_seconds(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Dragonfly (Redis-compatible) URL holding ledger snapshots.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,
}

impl InfrastructureConfig {
    /// Override infrastructure URLs with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: default_dragonfly_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Season simulator settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Synthetic population per archetype.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Window after joining within which a late joiner counts toward
    /// the hope metric if they acquire a star.
    #[serde(default = "default_hope_window_hours")]
    pub hope_window_hours: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            hope_window_hours: default_hope_window_hours(),
        }
    }
}

/// Number of synthetic players per archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PopulationConfig {
    /// Players who buy as soon as they can afford a star.
    #[serde(default = "default_early_buyers")]
    pub early_buyer: u32,
    /// Players who wait for a comfortable margin before buying.
    #[serde(default = "default_cautious")]
    pub cautious: u32,
    /// High-activity players who buy in bulk.
    #[serde(default = "default_whales")]
    pub whale: u32,
    /// Players who buy at random moments.
    #[serde(default = "default_random")]
    pub random: u32,
    /// Players who join in the second half of the season.
    #[serde(default = "default_late_joiners")]
    pub late_joiner: u32,
}

impl PopulationConfig {
    /// Total synthetic players.
    pub const fn total(&self) -> u32 {
        self.early_buyer
            .saturating_add(self.cautious)
            .saturating_add(self.whale)
            .saturating_add(self.random)
            .saturating_add(self.late_joiner)
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            early_buyer: default_early_buyers(),
            cautious: default_cautious(),
            whale: default_whales(),
            random: default_random(),
            late_joiner: default_late_joiners(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_season_start() -> DateTime<Utc> {
    // 2026-01-05T00:00:00Z
    DateTime::from_timestamp(1_767_571_200, 0).unwrap_or_default()
}

const fn default_watchdog_interval_seconds() -> u64 {
    30
}

const fn default_persistence_interval_seconds() -> u64 {
    30
}

const fn default_queue_capacity() -> usize {
    256
}

const fn default_pressure_alert_dedup_seconds() -> u64 {
    6 * 3_600
}

const fn default_invariant_alert_dedup_seconds() -> u64 {
    3_600
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_hope_window_hours() -> i64 {
    72
}

const fn default_early_buyers() -> u32 {
    40
}

const fn default_cautious() -> u32 {
    60
}

const fn default_whales() -> u32 {
    5
}

const fn default_random() -> u32 {
    60
}

const fn default_late_joiners() -> u32 {
    40
}
