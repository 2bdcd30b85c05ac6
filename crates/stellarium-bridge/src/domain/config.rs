//! Bridge configuration.
//!
//! [`BridgeConfig`] holds every runtime setting.  It is populated by the
//! binary from defaults, an optional TOML file and CLI flags (see
//! `infrastructure::config_file` and `main.rs`); the library only ever reads
//! it.

use std::net::SocketAddr;

/// Default TCP port Stellarium connects to.
pub const DEFAULT_PORT: u16 = 10001;

/// Default RCI WebSocket endpoint.
pub const DEFAULT_RCI_URL: &str = "ws://localhost:8502/api/ws";

/// Default value of the `client=` query parameter sent to the RCI server.
pub const DEFAULT_CLIENT_NAME: &str = "Stellarium";

/// Default number of framed packets buffered per Stellarium session.
pub const DEFAULT_SESSION_QUEUE_CAPACITY: usize = 32;

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use stellarium_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 10001);
/// assert_eq!(cfg.client_name, "Stellarium");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Address the Stellarium-facing TCP listener binds to.
    pub listen_addr: SocketAddr,

    /// WebSocket URL of the RCI control server, without the `client=` query
    /// parameter (the RCI client appends it).
    pub rci_url: String,

    /// Optional RCI password, sent as the WebSocket subprotocol.
    pub rci_password: Option<String>,

    /// Name this bridge identifies itself with to the RCI server.
    pub client_name: String,

    /// Capacity of each session's outbound packet queue.  When a slow
    /// Stellarium client lets its queue fill, further packets to it are
    /// dropped.
    pub session_queue_capacity: usize,

    /// Fallback `tracing` filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for BridgeConfig {
    /// | Field                  | Default                        |
    /// |------------------------|--------------------------------|
    /// | listen_addr            | `0.0.0.0:10001`                |
    /// | rci_url                | `ws://localhost:8502/api/ws`   |
    /// | rci_password           | none                           |
    /// | client_name            | `Stellarium`                   |
    /// | session_queue_capacity | 32                             |
    /// | log_level              | `info`                         |
    fn default() -> Self {
        Self {
            // Compile-time constant address; the parse cannot fail.
            listen_addr: "0.0.0.0:10001".parse().unwrap(),
            rci_url: DEFAULT_RCI_URL.to_string(),
            rci_password: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            session_queue_capacity: DEFAULT_SESSION_QUEUE_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listens_on_all_interfaces() {
        let cfg = BridgeConfig::default();
        assert!(cfg.listen_addr.ip().is_unspecified());
        assert_eq!(cfg.listen_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_default_rci_settings() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.rci_url, DEFAULT_RCI_URL);
        assert_eq!(cfg.rci_password, None);
        assert_eq!(cfg.client_name, DEFAULT_CLIENT_NAME);
    }

    #[test]
    fn test_default_queue_capacity_and_log_level() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.session_queue_capacity, 32);
        assert_eq!(cfg.log_level, "info");
    }
}
