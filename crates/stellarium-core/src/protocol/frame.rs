//! Length-prefixed framing for the Stellarium telescope-server stream.
//!
//! Wire format:
//! ```text
//! [total_len:2][payload:total_len-2]
//! ```
//! `total_len` is little-endian and **includes the two prefix bytes
//! themselves**, so an empty payload is announced as `02 00`.
//!
//! # Why a stateful decoder?
//!
//! TCP is a stream protocol: one `read()` may return half a frame, or three
//! frames glued together.  [`FrameDecoder`] keeps the unconsumed tail of the
//! stream between calls and hands out complete payloads as soon as they are
//! available.  Consumed bytes are split off the front of a `BytesMut`, so
//! they are never copied again.
//!
//! # Desynchronisation
//!
//! The protocol has no resynchronisation marker.  Once a prefix declares an
//! impossible length (larger than [`MAX_FRAME_LEN`], or shorter than the
//! prefix itself) there is no way to find the next frame boundary, so the
//! decoder stops making progress and reports
//! [`ProtocolError::FrameDesynchronized`].  The connection owner is expected
//! to close the connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;

/// Size of the little-endian length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Largest total frame length (prefix included) accepted from a peer.
pub const MAX_FRAME_LEN: usize = 9999;

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The payload is too large for the 16-bit length prefix.
    #[error("frame too large: payload of {payload_len} bytes does not fit a 16-bit length prefix")]
    FrameTooLarge { payload_len: usize },

    /// An inbound length prefix declared an impossible frame length.
    #[error("frame stream desynchronized: declared frame length {declared} (allowed 2..={max})", max = MAX_FRAME_LEN)]
    FrameDesynchronized { declared: u16 },

    /// An angle handed to the fixed-point codec was NaN or infinite.
    #[error("cannot encode non-finite angle {0}")]
    NonFiniteAngle(f64),

    /// A wire timestamp is outside the representable range.
    #[error("timestamp {0} µs is outside the representable range")]
    TimestampOutOfRange(i64),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Frames `payload` by prepending its total length (payload + 2).
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if `payload.len() + 2` does not
/// fit in 16 bits.  The payload is never truncated.
///
/// # Examples
///
/// ```rust
/// use stellarium_core::protocol::frame::encode_frame;
///
/// let framed = encode_frame(&[0xAA, 0xBB]).unwrap();
/// assert_eq!(&framed[..], &[0x04, 0x00, 0xAA, 0xBB]);
/// ```
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let total_len = payload.len() + LENGTH_PREFIX_LEN;
    let Ok(prefix) = u16::try_from(total_len) else {
        return Err(ProtocolError::FrameTooLarge {
            payload_len: payload.len(),
        });
    };

    let mut buf = BytesMut::with_capacity(total_len);
    buf.put_u16_le(prefix);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Incremental decoder that turns a byte stream into frame payloads.
///
/// # Examples
///
/// ```rust
/// use stellarium_core::protocol::frame::{encode_frame, FrameDecoder};
///
/// let framed = encode_frame(b"hello").unwrap();
/// let mut decoder = FrameDecoder::new();
///
/// // Deliver the frame in two pieces, as TCP might.
/// assert!(decoder.feed(&framed[..3]).is_empty());
/// let payloads = decoder.feed(&framed[3..]);
/// assert_eq!(payloads.len(), 1);
/// assert_eq!(&payloads[0][..], b"hello");
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes received but not yet returned as part of a payload.
    buffer: BytesMut,
    /// The offending length prefix once the stream has desynchronised.
    desynchronized_at: Option<u16>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data` to the unprocessed tail and returns every payload that
    /// is now complete, in stream order.
    ///
    /// Payloads completed before an invalid length prefix are still
    /// returned.  Once desynchronised, further calls retain their bytes but
    /// never return another payload; check [`desync_error`](Self::desync_error)
    /// after every call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.next_payload() {
            payloads.push(payload);
        }
        payloads
    }

    /// Returns `true` once an invalid length prefix has been seen.
    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized_at.is_some()
    }

    /// Returns the desynchronisation error, if any.
    pub fn desync_error(&self) -> Option<ProtocolError> {
        self.desynchronized_at
            .map(|declared| ProtocolError::FrameDesynchronized { declared })
    }

    /// Number of bytes currently held back waiting for more input.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn next_payload(&mut self) -> Option<Bytes> {
        if self.desynchronized_at.is_some() || self.buffer.len() < LENGTH_PREFIX_LEN {
            return None;
        }

        let declared = u16::from_le_bytes([self.buffer[0], self.buffer[1]]);
        let frame_len = usize::from(declared);
        if !(LENGTH_PREFIX_LEN..=MAX_FRAME_LEN).contains(&frame_len) {
            debug!("frame stream desynchronized by length prefix {declared}");
            self.desynchronized_at = Some(declared);
            return None;
        }

        if self.buffer.len() < frame_len {
            return None;
        }

        let mut frame = self.buffer.split_to(frame_len);
        frame.advance(LENGTH_PREFIX_LEN);
        Some(frame.freeze())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> Bytes {
        encode_frame(payload).expect("encode failed")
    }

    // ── encode_frame ─────────────────────────────────────────────────────────

    #[test]
    fn test_encode_prefix_counts_itself() {
        let bytes = framed(&[1, 2, 3]);
        assert_eq!(&bytes[..], &[5, 0, 1, 2, 3]);
    }

    #[test]
    fn test_encode_empty_payload_declares_two() {
        assert_eq!(&framed(&[])[..], &[2, 0]);
    }

    #[test]
    fn test_encode_largest_payload_that_fits() {
        let payload = vec![0u8; usize::from(u16::MAX) - LENGTH_PREFIX_LEN];
        let bytes = framed(&payload);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), u16::MAX);
    }

    #[test]
    fn test_encode_rejects_payload_overflowing_prefix() {
        // Arrange: payload + 2 == 2^16
        let payload = vec![0u8; usize::from(u16::MAX) - 1];

        // Act
        let result = encode_frame(&payload);

        // Assert
        assert_eq!(
            result,
            Err(ProtocolError::FrameTooLarge {
                payload_len: payload.len()
            })
        );
    }

    // ── FrameDecoder ─────────────────────────────────────────────────────────

    #[test]
    fn test_feed_single_frame_leaves_nothing_buffered() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.feed(&framed(b"abc"));
        assert_eq!(payloads, vec![Bytes::from_static(b"abc")]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_feed_every_split_point_yields_same_payload() {
        let bytes = framed(b"split me anywhere");
        for split in 0..=bytes.len() {
            // Arrange
            let mut decoder = FrameDecoder::new();

            // Act
            let mut payloads = decoder.feed(&bytes[..split]);
            payloads.extend(decoder.feed(&bytes[split..]));

            // Assert
            assert_eq!(
                payloads,
                vec![Bytes::from_static(b"split me anywhere")],
                "split at {split}"
            );
            assert_eq!(decoder.buffered_len(), 0);
        }
    }

    #[test]
    fn test_feed_byte_by_byte() {
        let bytes = framed(&[9; 20]);
        let mut decoder = FrameDecoder::new();
        let mut payloads = Vec::new();
        for b in bytes.iter() {
            payloads.extend(decoder.feed(&[*b]));
        }
        assert_eq!(payloads.len(), 1);
        assert_eq!(&payloads[0][..], &[9; 20]);
    }

    #[test]
    fn test_feed_coalesced_frames_in_order() {
        // Arrange: three frames in one read
        let mut stream = Vec::new();
        stream.extend_from_slice(&framed(b"one"));
        stream.extend_from_slice(&framed(b""));
        stream.extend_from_slice(&framed(b"three"));

        // Act
        let payloads = FrameDecoder::new().feed(&stream);

        // Assert
        assert_eq!(
            payloads,
            vec![
                Bytes::from_static(b"one"),
                Bytes::new(),
                Bytes::from_static(b"three"),
            ]
        );
    }

    #[test]
    fn test_feed_retains_partial_tail() {
        let mut stream = framed(b"done").to_vec();
        stream.extend_from_slice(&framed(b"pending")[..4]);

        let mut decoder = FrameDecoder::new();
        let payloads = decoder.feed(&stream);

        assert_eq!(payloads, vec![Bytes::from_static(b"done")]);
        assert_eq!(decoder.buffered_len(), 4);
    }

    #[test]
    fn test_feed_single_prefix_byte_waits() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&[0x05]).is_empty());
        assert_eq!(decoder.buffered_len(), 1);
        assert!(!decoder.is_desynchronized());
    }

    #[test]
    fn test_feed_max_frame_len_is_accepted() {
        let payload = vec![7u8; MAX_FRAME_LEN - LENGTH_PREFIX_LEN];
        let payloads = FrameDecoder::new().feed(&framed(&payload));
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].len(), payload.len());
    }

    #[test]
    fn test_feed_oversized_length_desynchronizes() {
        // Arrange: prefix declares 10000 bytes, followed by a valid frame
        let mut stream = 10_000u16.to_le_bytes().to_vec();
        stream.extend_from_slice(&framed(b"never decoded"));
        let mut decoder = FrameDecoder::new();

        // Act
        let payloads = decoder.feed(&stream);

        // Assert: nothing decoded, every byte retained
        assert!(payloads.is_empty());
        assert!(decoder.is_desynchronized());
        assert_eq!(decoder.buffered_len(), stream.len());
        assert_eq!(
            decoder.desync_error(),
            Some(ProtocolError::FrameDesynchronized { declared: 10_000 })
        );
    }

    #[test]
    fn test_feed_after_desync_makes_no_progress() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&u16::MAX.to_le_bytes());

        let payloads = decoder.feed(&framed(b"late"));

        assert!(payloads.is_empty());
        assert!(decoder.is_desynchronized());
    }

    #[test]
    fn test_feed_emits_frames_preceding_bad_prefix() {
        let mut stream = framed(b"good").to_vec();
        stream.extend_from_slice(&20_000u16.to_le_bytes());

        let mut decoder = FrameDecoder::new();
        let payloads = decoder.feed(&stream);

        assert_eq!(payloads, vec![Bytes::from_static(b"good")]);
        assert!(decoder.is_desynchronized());
    }

    #[test]
    fn test_feed_length_shorter_than_prefix_desynchronizes() {
        for declared in [0u16, 1] {
            let mut decoder = FrameDecoder::new();
            assert!(decoder.feed(&declared.to_le_bytes()).is_empty());
            assert_eq!(
                decoder.desync_error(),
                Some(ProtocolError::FrameDesynchronized { declared })
            );
        }
    }
}
