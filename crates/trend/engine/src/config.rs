//! Engine configuration.
//!
//! Loaded in layers: built-in defaults, then an optional file, then
//! `TREND_`-prefixed environment variables with `__` between nested keys
//! (`TREND_DETECTION__CONFIDENCE_THRESHOLD=0.7`).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use trend_detection::DetectionConfig;
use trend_types::TrendType;

use crate::error::{EngineError, EngineResult};

/// Main engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Detection parameters
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Background scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Point buffer and persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Trend type stamped on every trend of a category. Categories not listed
    /// keep the per-algorithm default type.
    #[serde(default)]
    pub category_types: BTreeMap<String, TrendType>,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent detection runs
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Full sweep over every known category, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Result cache eviction sweep, in seconds
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,

    /// Age after which cached trends are evicted, in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Ingestion triggers for one category within this window coalesce into
    /// one run. Zero submits a run for every point.
    #[serde(default = "default_trigger_debounce")]
    pub trigger_debounce_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            sweep_interval_secs: default_sweep_interval(),
            eviction_interval_secs: default_eviction_interval(),
            cache_ttl_secs: default_cache_ttl(),
            trigger_debounce_ms: default_trigger_debounce(),
        }
    }
}

/// Persistence backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process store (for development/testing)
    #[default]
    Memory,

    /// Append-only JSON lines file
    JsonLines {
        /// File path
        path: PathBuf,
    },
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Oldest points of a category are dropped beyond this count
    #[serde(default = "default_max_points")]
    pub max_points_per_category: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            max_points_per_category: default_max_points(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_max_workers() -> usize {
    3
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_eviction_interval() -> u64 {
    1800
}

/// Upper bound on `scheduler.cache_ttl_secs`, one hundred years.
pub const MAX_CACHE_TTL_SECS: u64 = 100 * 365 * 86_400;

fn default_cache_ttl() -> u64 {
    86_400
}

fn default_trigger_debounce() -> u64 {
    5000
}

fn default_max_points() -> usize {
    100_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration from an optional file plus the environment.
    ///
    /// The file format follows its extension (TOML, JSON or YAML). A missing
    /// file is not an error.
    pub fn load(path: Option<&str>) -> EngineResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TREND")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: EngineConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.detection.validate()?;
        if self.scheduler.max_workers == 0 {
            return Err(EngineError::Config("scheduler.max_workers must be positive".into()));
        }
        if self.scheduler.sweep_interval_secs == 0 || self.scheduler.eviction_interval_secs == 0 {
            return Err(EngineError::Config(
                "scheduler intervals must be positive".into(),
            ));
        }
        let ttl = self.scheduler.cache_ttl_secs;
        if ttl == 0 || ttl > MAX_CACHE_TTL_SECS {
            return Err(EngineError::Config(format!(
                "scheduler.cache_ttl_secs must be in 1..={MAX_CACHE_TTL_SECS}, got {ttl}"
            )));
        }
        if self.storage.max_points_per_category < self.detection.min_data_points {
            return Err(EngineError::Config(format!(
                "storage.max_points_per_category ({}) is below detection.min_data_points ({})",
                self.storage.max_points_per_category, self.detection.min_data_points
            )));
        }
        Ok(())
    }

    /// Configured trend type for `category`, matched exactly first and then
    /// ignoring ASCII case.
    pub fn category_type(&self, category: &str) -> Option<TrendType> {
        self.category_types.get(category).copied().or_else(|| {
            self.category_types
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(category))
                .map(|(_, t)| *t)
        })
    }
}
