//! Domain layer for stellarium-bridge.
//!
//! Plain data types shared by the other layers.  Nothing here opens sockets,
//! reads files, or touches the environment.

pub mod commands;
pub mod config;
pub mod status;

pub use commands::RciCommand;
pub use config::BridgeConfig;
pub use status::{StatusError, StatusSnapshot};
