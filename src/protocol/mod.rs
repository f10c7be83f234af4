//! Wire protocol for broadcast packets
//!
//! The broadcast wire format is a single self-delimiting frame per tick,
//! carrying the server timestamp clients use to synchronize playback.

pub mod packet;

pub use packet::{decode, encode, PacketError, SyncPacket, HEADER_LEN};
