//! Configuration for beatmap-features.

use crate::core::DEFAULT_APPROACH_WINDOW_MS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

const APP_DIR: &str = "beatmap-features";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite feature store
    pub store_path: PathBuf,

    /// JSON Lines archive of every ingested play
    pub history_path: PathBuf,

    /// Default directory for query exports
    pub export_path: PathBuf,

    /// Directory for state such as ingest statistics
    pub data_path: PathBuf,

    /// Approach window for plays that report no usable approach rate (ms)
    pub default_approach_window_ms: f64,

    /// Plays queued ahead of the extraction worker
    pub worker_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            store_path: data_dir.join("features.db"),
            history_path: data_dir.join("scorepoints.jsonl"),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            default_approach_window_ms: DEFAULT_APPROACH_WINDOW_MS,
            worker_queue_capacity: 16,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist. Missing fields take their default values.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Write configuration to `path`, creating its directory.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Path of the persisted ingest statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("ingest_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        for file in [&self.store_path, &self.history_path] {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.default_approach_window_ms.is_finite() && self.default_approach_window_ms > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "default_approach_window_ms must be positive, got {}",
                self.default_approach_window_ms
            )));
        }
        if self.worker_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "worker_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
