//! Worker configuration
//!
//! TOML file with serde defaults; every field may be omitted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tunables for one pipeline worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Dispatch attempts per change record before dead-lettering
    pub max_attempts: u32,
    /// Change records pulled from the log per batch
    pub batch_size: usize,
    /// Followers fetched per page during fan-out
    pub follower_page_size: usize,
    /// Feed rows written per batched store call
    pub fan_out_batch: usize,
    /// JSONL file receiving escalated records
    pub dead_letter_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            batch_size: 100,
            follower_page_size: 100,
            fan_out_batch: 25,
            dead_letter_path: PathBuf::from("dead-letter.jsonl"),
        }
    }
}

/// Config load failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl PipelineConfig {
    /// Load from a TOML file, missing fields filled with defaults
    ///
    /// # Errors
    /// `ConfigError::Io` when the file cannot be read, `ConfigError::Parse`
    /// when it is not valid TOML or carries unknown fields.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// With a custom attempt budget, floored at one
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// With a custom batch size, floored at one
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// With a custom dead-letter file
    #[inline]
    #[must_use]
    pub fn with_dead_letter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dead_letter_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_delivery_policy() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.follower_page_size, 100);
        assert_eq!(config.fan_out_batch, 25);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: PipelineConfig =
            toml::from_str("max_attempts = 2\nbatch_size = 10\n").unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.follower_page_size, 100);
    }

    #[test]
    fn unknown_field_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("max_atempts = 2\n");
        assert!(result.is_err());
    }

    #[test]
    fn load_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "fan_out_batch = 7\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.fan_out_batch, 7);
        assert_eq!(config.max_attempts, 5);
    }
}
