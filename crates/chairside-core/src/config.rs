use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

pub const WS_URL_ENV: &str = "CHAIRSIDE_WS_URL";

const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// WebSocket URL of the automation backend.
    pub ws_url: String,
    pub connect_timeout_secs: u64,
    /// Upper bound on retained progress log entries.
    pub max_log_entries: usize,
    /// Capacity of the event broadcast; slow subscribers beyond this lag.
    pub event_buffer: usize,
    pub command_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            connect_timeout_secs: 10,
            max_log_entries: 500,
            event_buffer: 256,
            command_buffer: 32,
        }
    }
}

impl BridgeConfig {
    pub fn config_path() -> Result<PathBuf, BridgeError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            BridgeError::Configuration("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("chairside").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable. Environment overrides are applied last.
    pub fn load() -> Result<Self, BridgeError> {
        let path = Self::config_path()?;

        let config = if path.exists() {
            match Self::load_from(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse config file, using defaults"
                    );
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        Ok(config.apply_env())
    }

    /// Load an explicit file. Unlike [`BridgeConfig::load`], parse errors are
    /// returned to the caller.
    pub fn load_from(path: &Path) -> Result<Self, BridgeError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            BridgeError::Configuration(format!("Invalid config at {}: {e}", path.display()))
        })
    }

    pub fn apply_env(mut self) -> Self {
        match std::env::var(WS_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => {
                self.ws_url = url;
            }
            _ => {}
        }
        self
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ws_url = \"ws://backend.local:9000/ws\"").unwrap();
        writeln!(file, "max_log_entries = 50").unwrap();

        let config = BridgeConfig::load_from(file.path()).unwrap();

        assert_eq!(config.ws_url, "ws://backend.local:9000/ws");
        assert_eq!(config.max_log_entries, 50);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn invalid_file_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_log_entries = \"lots\"").unwrap();

        let err = BridgeConfig::load_from(file.path()).unwrap_err();

        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let config = BridgeConfig {
            connect_timeout_secs: 0,
            ..BridgeConfig::default()
        };
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
    }
}
