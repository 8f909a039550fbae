//! Runtime configuration shared across the manager and game workers.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration.
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```ron
/// (max_fix_up_cascade: 200, proposal_timeout_ms: Some(5000))
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of each game's proposal queue.
    pub command_buffer_size: usize,
    /// Capacity of each event bus topic.
    pub event_buffer_size: usize,
    /// Longest fix-up chain a single move may trigger before the game is
    /// declared broken.
    pub max_fix_up_cascade: usize,
    /// Default deadline for proposals, measured from submission. `None`
    /// waits forever.
    pub proposal_timeout_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_buffer_size: 100,
            max_fix_up_cascade: 1000,
            proposal_timeout_ms: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "command_buffer_size must be at least 1".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "event_buffer_size must be at least 1".to_string(),
            ));
        }
        if self.max_fix_up_cascade == 0 {
            return Err(ConfigError::Invalid(
                "max_fix_up_cascade must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn proposal_timeout(&self) -> Option<Duration> {
        self.proposal_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config =
            RuntimeConfig::from_ron_str("(max_fix_up_cascade: 50, proposal_timeout_ms: Some(250))")
                .unwrap();
        assert_eq!(config.max_fix_up_cascade, 50);
        assert_eq!(config.command_buffer_size, 32);
        assert_eq!(config.proposal_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_rejects_zero_cascade() {
        let err = RuntimeConfig::from_ron_str("(max_fix_up_cascade: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("runtime.ron");
        std::fs::write(&path, "(event_buffer_size: 8)").unwrap();
        assert_eq!(RuntimeConfig::load(&path).unwrap().event_buffer_size, 8);
    }
}
