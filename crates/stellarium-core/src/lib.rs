//! # stellarium-core
//!
//! Shared library for the Stellarium ↔ RCI bridge containing the Stellarium
//! telescope-server wire protocol and the equatorial ↔ horizontal coordinate
//! transform.
//!
//! It has zero dependencies on sockets, async runtimes, or the RCI control
//! server; everything here is pure data conversion and can be tested in
//! isolation.
//!
//! # Architecture overview (for beginners)
//!
//! Stellarium can drive a telescope through a tiny binary protocol: the
//! planetarium connects over TCP, receives periodic "current position"
//! reports, and sends "goto" requests when the user asks to slew.  The mount
//! we drive, however, is an alt-azimuth radar dish that only understands
//! azimuth and elevation.  This crate provides the two halves needed to glue
//! them together:
//!
//! - **`protocol`** – How bytes travel over the Stellarium connection.  Every
//!   message is a little-endian length-prefixed frame; the payload starts
//!   with a packet type and carries fixed-point angles and a microsecond
//!   timestamp.
//!
//! - **`coords`** – Conversions between catalog coordinates (ICRS right
//!   ascension / declination) and the observer's horizon (azimuth /
//!   elevation) at a given place and time.

pub mod coords;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `stellarium_core::GotoPacket` instead of the full module path.
pub use coords::{
    CoordinateTransform, Equatorial, GeoLocation, Horizontal, SiderealTransform, TransformError,
};
pub use protocol::frame::{encode_frame, FrameDecoder, ProtocolError};
pub use protocol::packets::{decode_packet, CurrentPositionPacket, GotoPacket, InboundPacket};
