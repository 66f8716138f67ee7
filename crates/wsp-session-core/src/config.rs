//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, SessionError};

/// Per-call session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for each peer connection engine call
    pub negotiation_timeout_ms: u64,
    /// Label of the direct signaling channel
    pub data_channel_label: String,
    /// Capacity of the call event broadcast channel
    pub event_buffer: usize,
    /// Transitions kept in the session history
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout_ms: 10_000,
            data_channel_label: "wsp".to_string(),
            event_buffer: 64,
            history_limit: 64,
        }
    }
}

impl SessionConfig {
    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| SessionError::config(format!("invalid session config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SessionError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.negotiation_timeout_ms == 0 {
            return Err(SessionError::config("negotiation_timeout_ms must be greater than 0"));
        }
        if self.data_channel_label.trim().is_empty() {
            return Err(SessionError::config("data_channel_label must not be empty"));
        }
        if self.event_buffer == 0 {
            return Err(SessionError::config("event_buffer must be greater than 0"));
        }
        if self.history_limit == 0 {
            return Err(SessionError::config("history_limit must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data_channel_label, "wsp");
        assert_eq!(config.negotiation_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SessionConfig::from_toml_str("negotiation_timeout_ms = 2500\n").unwrap();
        assert_eq!(config.negotiation_timeout_ms, 2500);
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SessionConfig::from_toml_str("negotiation_timeout_ms = 0"),
            Err(SessionError::Configuration { .. })
        ));
        assert!(SessionConfig::from_toml_str("data_channel_label = \"  \"").is_err());
        assert!(SessionConfig::from_toml_str("event_buffer = \"many\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "data_channel_label = \"signal\"").unwrap();
        writeln!(file, "history_limit = 16").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.data_channel_label, "signal");
        assert_eq!(config.history_limit, 16);

        assert!(SessionConfig::from_file("/nonexistent/wsp.toml").is_err());
    }
}
