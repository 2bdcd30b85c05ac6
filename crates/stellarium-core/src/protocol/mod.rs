//! Stellarium telescope-server protocol: fixed-point codec, length-prefixed
//! framing, and typed packets.

pub mod fixed_point;
pub mod frame;
pub mod packets;

pub use fixed_point::{
    decode_dec, decode_ra, decode_timestamp, encode_dec, encode_ra, encode_timestamp,
};
pub use frame::{encode_frame, FrameDecoder, ProtocolError, LENGTH_PREFIX_LEN, MAX_FRAME_LEN};
pub use packets::{decode_packet, CurrentPositionPacket, GotoPacket, InboundPacket};
