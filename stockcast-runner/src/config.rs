//! Serializable service configuration.
//!
//! Every field has a default, so an empty TOML file (or no file at all) is a
//! valid configuration. Durations are given in whole seconds or hours.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stockcast_core::domain::{Horizon, CANONICAL_HORIZONS};
use stockcast_core::forecast::OrchestratorConfig;
use stockcast_core::staleness::DEFAULT_PREDICTION_CADENCE_DAYS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StockcastConfig {
    pub paths: PathsConfig,
    pub forecast: ForecastConfig,
    pub staleness: StalenessConfig,
    pub schedule: ScheduleConfig,
    pub snapshots: SnapshotConfig,
    pub provider: ProviderConfig,
    /// History fetched for a symbol that has never been updated.
    pub backfill_years: u32,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub store_dir: PathBuf,
    pub log_file: PathBuf,
    pub snapshot_dir: PathBuf,
}

/// Forecast orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForecastConfig {
    /// Horizon tasks in flight per symbol. Absent means one per horizon.
    pub concurrency: Option<usize>,
    pub task_timeout_secs: u64,
    pub horizons: Vec<Horizon>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StalenessConfig {
    pub prediction_cadence_days: i64,
}

/// Periodic job intervals for the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub update_interval_hours: u64,
    pub snapshot_interval_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotConfig {
    pub trending_days: i64,
    pub top_days: i64,
    pub size: usize,
}

/// Market data provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for StockcastConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            forecast: ForecastConfig::default(),
            staleness: StalenessConfig::default(),
            schedule: ScheduleConfig::default(),
            snapshots: SnapshotConfig::default(),
            provider: ProviderConfig::default(),
            backfill_years: 10,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data/store"),
            log_file: PathBuf::from("data/logs/update.log"),
            snapshot_dir: PathBuf::from("data/snapshots"),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            task_timeout_secs: 300,
            horizons: CANONICAL_HORIZONS.to_vec(),
        }
    }
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            prediction_cadence_days: DEFAULT_PREDICTION_CADENCE_DAYS,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            update_interval_hours: 24,
            snapshot_interval_hours: 24,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            trending_days: 7,
            top_days: 30,
            size: 10,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_retries: 0,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl StockcastConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forecast.concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "forecast.concurrency must be at least 1".into(),
            ));
        }
        if self.forecast.task_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "forecast.task_timeout_secs must be positive".into(),
            ));
        }
        if self.forecast.horizons.is_empty() {
            return Err(ConfigError::Invalid("forecast.horizons is empty".into()));
        }
        if self.staleness.prediction_cadence_days <= 0 {
            return Err(ConfigError::Invalid(
                "staleness.prediction_cadence_days must be positive".into(),
            ));
        }
        if self.schedule.update_interval_hours == 0 || self.schedule.snapshot_interval_hours == 0
        {
            return Err(ConfigError::Invalid(
                "schedule intervals must be positive".into(),
            ));
        }
        if self.snapshots.size == 0 {
            return Err(ConfigError::Invalid("snapshots.size must be positive".into()));
        }
        if self.snapshots.trending_days <= 0 || self.snapshots.top_days <= 0 {
            return Err(ConfigError::Invalid(
                "snapshot windows must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Orchestrator settings derived from the `forecast` section.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            concurrency: self.forecast.concurrency.unwrap_or(0),
            task_timeout: Duration::from_secs(self.forecast.task_timeout_secs),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.update_interval_hours * 3600)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.snapshot_interval_hours * 3600)
    }
}
