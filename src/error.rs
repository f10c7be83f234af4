//! Crate-level error types
//!
//! Errors follow a containment policy: per-stream and per-tick failures are
//! terminal only for that stream or tick, never for the broadcaster or the
//! scheduler. Only transport accept failure and explicit shutdown end the
//! server itself.

use std::io;
use std::path::PathBuf;

use crate::protocol::PacketError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for broadcast server operations
#[derive(Debug)]
pub enum Error {
    /// The accept loop could not obtain the next session from the transport
    TransportAccept(String),
    /// A session failed to become ready
    SessionReady(io::Error),
    /// A ready session failed to create its bidirectional stream
    StreamCreate(io::Error),
    /// A write to a specific stream failed
    StreamWrite(io::Error),
    /// A session reported closed, with or without a transport error
    SessionClosed(Option<io::Error>),
    /// The audio source could not be opened
    AudioOpen { path: PathBuf, source: io::Error },
    /// The audio source could not be read for a tick
    AudioRead(io::Error),
    /// Wire packet framing error
    Packet(PacketError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TransportAccept(msg) => write!(f, "Transport accept failed: {}", msg),
            Error::SessionReady(e) => write!(f, "Session failed to become ready: {}", e),
            Error::StreamCreate(e) => write!(f, "Stream creation failed: {}", e),
            Error::StreamWrite(e) => write!(f, "Stream write failed: {}", e),
            Error::SessionClosed(Some(e)) => write!(f, "Session closed with error: {}", e),
            Error::SessionClosed(None) => write!(f, "Session closed"),
            Error::AudioOpen { path, source } => {
                write!(f, "Failed to open audio source {}: {}", path.display(), source)
            }
            Error::AudioRead(e) => write!(f, "Audio source read failed: {}", e),
            Error::Packet(e) => write!(f, "Packet error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SessionReady(e)
            | Error::StreamCreate(e)
            | Error::StreamWrite(e)
            | Error::AudioRead(e)
            | Error::SessionClosed(Some(e)) => Some(e),
            Error::AudioOpen { source, .. } => Some(source),
            Error::Packet(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PacketError> for Error {
    fn from(e: PacketError) -> Self {
        Error::Packet(e)
    }
}
