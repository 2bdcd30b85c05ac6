//! stellarium-bridge library crate.
//!
//! Connects Stellarium's telescope-server protocol to an alt-azimuth mount
//! driven by the RCI control server.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Stellarium (binary frames over TCP, port 10001)
//!         ↕
//! [stellarium-bridge]
//!   ├── domain/           Pure types: BridgeConfig, StatusSnapshot, RciCommand
//!   ├── application/      ControlService seam, goto handling, status fan-out
//!   └── infrastructure/
//!         ├── tcp_server/  Stellarium accept loop and per-session tasks
//!         ├── rci_conn/    WebSocket client for the RCI control server
//!         └── config_file/ TOML configuration loading
//!         ↕
//! RCI control server (JSON over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async code.
//! - `application` depends on `domain` and `stellarium-core`; it talks to the
//!   mount only through the [`application::ControlService`] trait.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tokio-tungstenite`.

/// Domain layer: configuration and RCI message types (no I/O).
pub mod domain;

/// Application layer: goto handling and status fan-out.
pub mod application;

/// Infrastructure layer: TCP server, RCI WebSocket client, config file.
pub mod infrastructure;
