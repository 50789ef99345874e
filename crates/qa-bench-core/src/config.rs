//! Benchmark configuration
//!
//! Configuration is read from `qa-bench.toml`. Every field is optional;
//! command-line flags override whatever the file says.

pub mod types;

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BenchError, Result};
use crate::{bail_invalid, bail_usage};

pub use types::{BenchConfig, DatasetConfig, CONFIG_FILE_NAME};

impl BenchConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: BenchConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            tracing::debug!(path = %path.display(), "config_loaded");
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config_missing_using_defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BenchError::Other(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            bail_invalid!("max_concurrency", "0 (must be at least 1)");
        }
        if self.max_items == 0 {
            bail_invalid!("max_items", "0 (must be at least 1)");
        }
        if self.modes.is_empty() || self.contracts.is_empty() {
            bail_usage!("the configuration grid is empty: at least one mode and one contract are required");
        }
        if self.model.trim().is_empty() || self.judge_model.trim().is_empty() {
            bail_invalid!("model", "model names must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail_invalid!("request_timeout_secs", "0 (must be at least 1)");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
