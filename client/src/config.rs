//! Bridge configuration read once at startup
//!
//! ```json
//! { "host": "127.0.0.1", "port": 3000 }
//! ```
//!
//! A missing or malformed file falls back to `127.0.0.1:3000`.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "bridge.json";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed bridge config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// Fixed wait between a close and the next connect attempt
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: shared::DEFAULT_HOST.to_string(),
            port: shared::DEFAULT_PORT,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Never fails: any problem with the file yields the default target
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => {
                info!("Bridge target {}", config.addr());
                config
            }
            Err(e) => {
                let config = Self::default();
                warn!("{}, falling back to {}", e, config.addr());
                config
            }
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = BridgeConfig::from_json(r#"{ "host": "10.0.0.5", "port": 4000 }"#).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 4000);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(2000));
        assert_eq!(config.addr(), "10.0.0.5:4000");
    }

    #[test]
    fn test_parse_custom_delay() {
        let config =
            BridgeConfig::from_json(r#"{ "host": "h", "port": 1, "reconnect_delay_ms": 25 }"#)
                .unwrap();
        assert_eq!(config.reconnect_delay(), Duration::from_millis(25));
    }

    #[test]
    fn test_malformed_config_rejected() {
        assert!(BridgeConfig::from_json("{ not json").is_err());
        assert!(BridgeConfig::from_json(r#"{ "host": "h", "port": 70000 }"#).is_err());
        assert!(BridgeConfig::from_json(r#"{ "port": 1 }"#).is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = BridgeConfig::load_or_default("/definitely/not/here/bridge.json");
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let path = std::env::temp_dir().join(format!("bridge-test-{}.json", std::process::id()));
        std::fs::write(&path, "port = 3000").unwrap();

        let config = BridgeConfig::load_or_default(&path);
        assert_eq!(config, BridgeConfig::default());

        let _ = std::fs::remove_file(path);
    }
}
