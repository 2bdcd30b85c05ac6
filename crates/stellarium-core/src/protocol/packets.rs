//! Typed Stellarium telescope-server packets.
//!
//! Every payload starts with a little-endian `u16` packet type followed by a
//! fixed-size body.  All multi-byte integers are little-endian.
//!
//! | Packet                  | Direction       | Type | Body layout                                         |
//! |-------------------------|-----------------|------|-----------------------------------------------------|
//! | [`GotoPacket`]          | client → bridge | 0    | `time_us:i64, ra:u32, dec:i32` (16 bytes)           |
//! | [`CurrentPositionPacket`] | bridge → client | 0  | `time_us:i64, ra:u32, dec:i32, status:i32` (20 bytes) |
//!
//! Both packets use type 0.  The protocol disambiguates them by direction
//! only: type 0 is a goto when received and a position report when sent.
//! [`decode_packet`] therefore only ever produces goto packets.
//!
//! The body layouts are spelled out field by field in `encode_body` /
//! `decode_body`; the angle and time fields always go through
//! [`crate::protocol::fixed_point`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::protocol::fixed_point::{
    decode_dec, decode_ra, decode_timestamp, encode_dec, encode_ra, encode_timestamp,
};
use crate::protocol::frame::{encode_frame, ProtocolError};

/// Size of the packet-type discriminator at the start of every payload.
pub const PACKET_TYPE_LEN: usize = 2;

/// Packet type of a goto request (client → bridge).
pub const GOTO_PACKET_TYPE: u16 = 0;

/// Packet type of a position report (bridge → client).
pub const CURRENT_POSITION_PACKET_TYPE: u16 = 0;

/// Body size of a [`GotoPacket`].
pub const GOTO_BODY_LEN: usize = 16;

/// Body size of a [`CurrentPositionPacket`].
pub const CURRENT_POSITION_BODY_LEN: usize = 20;

/// Status value reported to Stellarium when the mount position is valid.
pub const STATUS_OK: i32 = 0;

// ── GotoPacket ────────────────────────────────────────────────────────────────

/// A request from the planetarium to slew to an ICRS coordinate.
///
/// Fields hold the raw wire values; use the accessor methods to obtain
/// degrees and instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GotoPacket {
    /// Microseconds since the Unix epoch at which the pointing is intended.
    pub time_us: i64,
    /// Right ascension, fixed point (full range = 360°).
    pub ra: u32,
    /// Declination, fixed point (2^30 = 90°).
    pub dec: i32,
}

impl GotoPacket {
    /// Builds a goto packet from logical values.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NonFiniteAngle`] if either angle is NaN or
    /// infinite.
    pub fn new(time: DateTime<Utc>, ra_deg: f64, dec_deg: f64) -> Result<Self, ProtocolError> {
        Ok(Self {
            time_us: encode_timestamp(time),
            ra: encode_ra(ra_deg)?,
            dec: encode_dec(dec_deg)?,
        })
    }

    /// The intended pointing time.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TimestampOutOfRange`] for absurd peer clocks.
    pub fn time(&self) -> Result<DateTime<Utc>, ProtocolError> {
        decode_timestamp(self.time_us)
    }

    /// Right ascension in degrees, [0, 360).
    pub fn ra_degrees(&self) -> f64 {
        decode_ra(self.ra)
    }

    /// Declination in degrees.
    pub fn dec_degrees(&self) -> f64 {
        decode_dec(self.dec)
    }

    /// Parses a body (the payload minus its type discriminator).
    ///
    /// Returns `None` unless the body is exactly [`GOTO_BODY_LEN`] bytes.
    pub fn decode_body(mut body: &[u8]) -> Option<Self> {
        if body.len() != GOTO_BODY_LEN {
            return None;
        }
        Some(Self {
            time_us: body.get_i64_le(),
            ra: body.get_u32_le(),
            dec: body.get_i32_le(),
        })
    }

    /// Appends the body to `buf`.
    pub fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64_le(self.time_us);
        buf.put_u32_le(self.ra);
        buf.put_i32_le(self.dec);
    }

    /// Serializes the full payload (type discriminator + body).
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_TYPE_LEN + GOTO_BODY_LEN);
        buf.put_u16_le(GOTO_PACKET_TYPE);
        self.encode_body(&mut buf);
        buf.freeze()
    }

    /// Serializes the payload and wraps it in a frame.
    ///
    /// # Errors
    ///
    /// Propagates [`ProtocolError::FrameTooLarge`]; cannot happen for this
    /// fixed-size packet.
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        encode_frame(&self.to_payload())
    }
}

// ── CurrentPositionPacket ─────────────────────────────────────────────────────

/// A report of where the mount is currently pointing, in ICRS coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentPositionPacket {
    /// Microseconds since the Unix epoch at which the position was valid.
    pub time_us: i64,
    /// Right ascension, fixed point (full range = 360°).
    pub ra: u32,
    /// Declination, fixed point (2^30 = 90°).
    pub dec: i32,
    /// Stellarium status flag; [`STATUS_OK`] for a valid position.
    pub status: i32,
}

impl CurrentPositionPacket {
    /// Builds a position report with [`STATUS_OK`] from logical values.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NonFiniteAngle`] if either angle is NaN or
    /// infinite.
    pub fn new(time: DateTime<Utc>, ra_deg: f64, dec_deg: f64) -> Result<Self, ProtocolError> {
        Ok(Self {
            time_us: encode_timestamp(time),
            ra: encode_ra(ra_deg)?,
            dec: encode_dec(dec_deg)?,
            status: STATUS_OK,
        })
    }

    /// The instant the position refers to.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TimestampOutOfRange`] if the stored value is
    /// outside chrono's range.
    pub fn time(&self) -> Result<DateTime<Utc>, ProtocolError> {
        decode_timestamp(self.time_us)
    }

    /// Right ascension in degrees, [0, 360).
    pub fn ra_degrees(&self) -> f64 {
        decode_ra(self.ra)
    }

    /// Declination in degrees.
    pub fn dec_degrees(&self) -> f64 {
        decode_dec(self.dec)
    }

    /// Parses a body; `None` unless it is exactly [`CURRENT_POSITION_BODY_LEN`] bytes.
    pub fn decode_body(mut body: &[u8]) -> Option<Self> {
        if body.len() != CURRENT_POSITION_BODY_LEN {
            return None;
        }
        Some(Self {
            time_us: body.get_i64_le(),
            ra: body.get_u32_le(),
            dec: body.get_i32_le(),
            status: body.get_i32_le(),
        })
    }

    /// Parses a full payload as seen by a Stellarium client.
    ///
    /// Used by test clients; the bridge itself never receives this packet.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let (packet_type, body) = split_payload(payload)?;
        if packet_type != CURRENT_POSITION_PACKET_TYPE {
            return None;
        }
        Self::decode_body(body)
    }

    /// Appends the body to `buf`.
    pub fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64_le(self.time_us);
        buf.put_u32_le(self.ra);
        buf.put_i32_le(self.dec);
        buf.put_i32_le(self.status);
    }

    /// Serializes the full payload (type discriminator + body).
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_TYPE_LEN + CURRENT_POSITION_BODY_LEN);
        buf.put_u16_le(CURRENT_POSITION_PACKET_TYPE);
        self.encode_body(&mut buf);
        buf.freeze()
    }

    /// Serializes the payload and wraps it in a frame.
    ///
    /// # Errors
    ///
    /// Propagates [`ProtocolError::FrameTooLarge`]; cannot happen for this
    /// fixed-size packet.
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        encode_frame(&self.to_payload())
    }
}

// ── Inbound dispatch ──────────────────────────────────────────────────────────

/// Result of decoding a payload received from a Stellarium client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPacket {
    /// A well-formed goto request.
    Goto(GotoPacket),
    /// Anything else.  Not an error: callers drop it.
    Unrecognized {
        /// The discriminator, or `None` if the payload was shorter than 2 bytes.
        packet_type: Option<u16>,
        /// Length of the payload after the discriminator.
        body_len: usize,
    },
}

/// Decodes a payload received from a client.
///
/// Short payloads, unknown discriminators and bodies of the wrong size all
/// come back as [`InboundPacket::Unrecognized`].
///
/// # Examples
///
/// ```rust
/// use stellarium_core::protocol::packets::{decode_packet, InboundPacket};
///
/// assert_eq!(
///     decode_packet(&[0x07]),
///     InboundPacket::Unrecognized { packet_type: None, body_len: 0 }
/// );
/// ```
pub fn decode_packet(payload: &[u8]) -> InboundPacket {
    let Some((packet_type, body)) = split_payload(payload) else {
        return InboundPacket::Unrecognized {
            packet_type: None,
            body_len: 0,
        };
    };

    let unrecognized = InboundPacket::Unrecognized {
        packet_type: Some(packet_type),
        body_len: body.len(),
    };

    match packet_type {
        GOTO_PACKET_TYPE => GotoPacket::decode_body(body)
            .map(InboundPacket::Goto)
            .unwrap_or(unrecognized),
        _ => unrecognized,
    }
}

fn split_payload(payload: &[u8]) -> Option<(u16, &[u8])> {
    if payload.len() < PACKET_TYPE_LEN {
        return None;
    }
    let (head, body) = payload.split_at(PACKET_TYPE_LEN);
    Some((u16::from_le_bytes([head[0], head[1]]), body))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
