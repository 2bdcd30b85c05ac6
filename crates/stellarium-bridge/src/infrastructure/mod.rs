//! Infrastructure layer for stellarium-bridge.
//!
//! All I/O lives here: the Stellarium-facing TCP listener, the WebSocket
//! connection to the RCI control server, and the TOML configuration file.
//!
//! # What does NOT belong here?
//!
//! - Coordinate math or packet layouts (`stellarium-core`)
//! - Deciding what a goto or status update means (application layer)

pub mod config_file;
pub mod rci_conn;
pub mod tcp_server;

pub use config_file::{ConfigError, ConfigFile};
pub use rci_conn::RciClient;
pub use tcp_server::{run_listener, run_server, run_session, SessionContext, SessionError};
