//! Configuration for reference selection.
//!
//! Provides centralized configuration for the collectors and the logging
//! layer with sensible defaults, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::error::{Result, XrefError};

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefConfig {
    /// Reference collection configuration.
    pub collector: CollectorConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Reference collection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Stop after visiting this many units. `None` walks the whole input.
    pub max_units: Option<usize>,
    /// Emit a warning for every corrupt unit skipped.
    pub warn_on_corrupt: bool,
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_units == Some(0) {
            return Err(XrefError::Config(
                "collector.max_units must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_units: None,
            warn_on_corrupt: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl XrefConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json_str: &str) -> Result<Self> {
        let config: XrefConfig =
            serde_json::from_str(json_str).map_err(|e| XrefError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| XrefError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.collector.validate()?;
        EnvFilter::try_new(&self.logging.level).map_err(|e| {
            XrefError::Config(format!(
                "invalid logging.level '{}': {}",
                self.logging.level, e
            ))
        })?;
        Ok(())
    }
}
