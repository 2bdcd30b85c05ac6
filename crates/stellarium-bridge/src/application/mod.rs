//! Application layer for stellarium-bridge.
//!
//! Knows *what* happens when Stellarium asks for a goto or the mount reports
//! a new position, and delegates *how* bytes move to the infrastructure
//! layer.
//!
//! # Responsibilities
//!
//! - The [`ControlService`] seam to the RCI control server
//! - Turning status snapshots into position reports and gotos into commands
//! - Delivering position reports to every connected session
//!
//! # What does NOT belong here?
//!
//! - Sockets, WebSocket framing, or task spawning (infrastructure)

pub mod bridge_service;
pub mod control;
pub mod fanout;

pub use bridge_service::{build_status_packet, goto_target, handle_goto, BridgeError};
pub use control::{ControlCommands, ControlError, ControlService};
pub use fanout::StatusFanout;
