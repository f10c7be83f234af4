//! Sync packet framing
//!
//! Every broadcast chunk is framed with the server's wall-clock timestamp so
//! that independently-connected clients can line up playback. The frame is a
//! fixed 12-byte big-endian header followed by the raw audio payload:
//!
//! ```text
//! +---------------+----------------+------------+
//! | timestamp (8) | payloadLen (4) | payload(N) |
//! +---------------+----------------+------------+
//! ```
//!
//! Encoding and decoding are pure; the send path never produces a malformed
//! frame, but any conformant decoder must reject one.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed packet header in bytes (u64 timestamp + u32 length)
pub const HEADER_LEN: usize = 12;

/// A decoded sync packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPacket {
    /// Server wall-clock timestamp in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Audio payload (zero-copy via reference counting)
    pub payload: Bytes,
}

/// Error type for packet decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Fewer bytes than the fixed header requires
    Truncated { len: usize },
    /// Declared payload length does not match the remaining bytes
    LengthMismatch { declared: u32, actual: usize },
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::Truncated { len } => {
                write!(f, "Malformed packet: {} bytes, need at least {}", len, HEADER_LEN)
            }
            PacketError::LengthMismatch { declared, actual } => {
                write!(
                    f,
                    "Malformed packet: declared payload length {} but {} bytes follow the header",
                    declared, actual
                )
            }
        }
    }
}

impl std::error::Error for PacketError {}

/// Encode a payload and timestamp into a wire frame
///
/// Produces the 8-byte big-endian timestamp, the 4-byte big-endian payload
/// length, then the payload, with no padding.
pub fn encode(payload: &Bytes, timestamp_ms: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u64(timestamp_ms);
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(payload);
    buf.freeze()
}

/// Decode a wire frame back into a [`SyncPacket`]
///
/// Exact inverse of [`encode`]. Fails if fewer than [`HEADER_LEN`] bytes are
/// present or the declared length does not match the remaining bytes.
pub fn decode(frame: &Bytes) -> Result<SyncPacket, PacketError> {
    if frame.len() < HEADER_LEN {
        return Err(PacketError::Truncated { len: frame.len() });
    }

    let mut header = frame.clone();
    let timestamp_ms = header.get_u64();
    let declared = header.get_u32();
    let actual = header.remaining();

    if declared as usize != actual {
        return Err(PacketError::LengthMismatch { declared, actual });
    }

    Ok(SyncPacket {
        timestamp_ms,
        payload: frame.slice(HEADER_LEN..),
    })
}
