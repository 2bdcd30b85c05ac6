//! TOML configuration file for the bridge.
//!
//! Every key is optional; missing keys fall back to the [`BridgeConfig`]
//! defaults.  Example:
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 10001
//! session_queue_capacity = 32
//!
//! [rci]
//! url = "ws://radar.local:8502/api/ws"
//! password = "hunter2"
//! client_name = "Stellarium"
//!
//! [logging]
//! level = "debug"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    BridgeConfig, DEFAULT_CLIENT_NAME, DEFAULT_PORT, DEFAULT_RCI_URL,
    DEFAULT_SESSION_QUEUE_CAPACITY,
};

/// Error type for loading and validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` and `port` do not form a socket address.
    #[error("invalid listen address '{0}'")]
    InvalidListenAddress(String),

    /// A zero-capacity session queue would drop every packet.
    #[error("session_queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub rci: RciSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Stellarium-facing listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_queue_capacity")]
    pub session_queue_capacity: usize,
}

/// RCI control-server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RciSection {
    #[serde(default = "default_rci_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_queue_capacity() -> usize {
    DEFAULT_SESSION_QUEUE_CAPACITY
}
fn default_rci_url() -> String {
    DEFAULT_RCI_URL.to_string()
}
fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            session_queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for RciSection {
    fn default() -> Self {
        Self {
            url: default_rci_url(),
            password: None,
            client_name: default_client_name(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ConfigFile {
    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Validates the file contents and produces the runtime configuration.
    pub fn into_bridge_config(self) -> Result<BridgeConfig, ConfigError> {
        let raw = format!("{}:{}", self.server.bind_address, self.server.port);
        let listen_addr: SocketAddr = raw
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(raw.clone()))?;

        if self.server.session_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        Ok(BridgeConfig {
            listen_addr,
            rci_url: self.rci.url,
            rci_password: self.rci.password,
            client_name: self.rci.client_name,
            session_queue_capacity: self.server.session_queue_capacity,
            log_level: self.logging.level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_default_bridge_config() {
        // Arrange / Act
        let config = ConfigFile::from_toml_str("")
            .unwrap()
            .into_bridge_config()
            .unwrap();

        // Assert
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let text = r#"
            [server]
            port = 10002

            [rci]
            password = "secret"
        "#;

        let config = ConfigFile::from_toml_str(text)
            .unwrap()
            .into_bridge_config()
            .unwrap();

        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:10002");
        assert_eq!(config.rci_password.as_deref(), Some("secret"));
        assert_eq!(config.rci_url, DEFAULT_RCI_URL);
        assert_eq!(config.client_name, DEFAULT_CLIENT_NAME);
    }

    #[test]
    fn test_full_file() {
        let text = r#"
            [server]
            bind_address = "127.0.0.1"
            port = 4030
            session_queue_capacity = 4

            [rci]
            url = "ws://radar.local:8502/api/ws"
            client_name = "dome"

            [logging]
            level = "debug"
        "#;

        let config = ConfigFile::from_toml_str(text)
            .unwrap()
            .into_bridge_config()
            .unwrap();

        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:4030");
        assert_eq!(config.session_queue_capacity, 4);
        assert_eq!(config.rci_url, "ws://radar.local:8502/api/ws");
        assert_eq!(config.client_name, "dome");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = ConfigFile::from_toml_str("[server\nport = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let result = ConfigFile::from_toml_str("[server]\nport = \"ten thousand\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let mut file = ConfigFile::default();
        file.server.bind_address = "not.an.ip".to_string();

        let result = file.into_bridge_config();

        assert!(matches!(result, Err(ConfigError::InvalidListenAddress(_))));
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let mut file = ConfigFile::default();
        file.server.session_queue_capacity = 0;

        assert!(matches!(
            file.into_bridge_config(),
            Err(ConfigError::ZeroQueueCapacity)
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ConfigFile::load(Path::new("/definitely/not/here/bridge.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
