//! Transport capability traits
//!
//! The broadcast core does not implement a session/stream transport. It is
//! written against the small capability surface below, which an external
//! layer (QUIC/WebTransport, or the in-process loopback used by the demos
//! and tests) provides: accept a session, observe its ready/closed
//! notifications, open one bidirectional stream per session, and write to
//! the stream's writable half. The readable half is reserved for future
//! control messages and is not part of the capability surface.
//!
//! Notification methods (`ready`, `closed`) are plain futures rather than
//! registered callbacks, so session and stream teardown is observed by
//! whoever awaits them. `closed()` may be awaited by multiple waiters;
//! every waiter resolves once the underlying resource terminates.

use std::future::Future;
use std::io;

use bytes::Bytes;

#[cfg(test)]
pub(crate) mod testing;

/// A bidirectional stream belonging to exactly one session.
///
/// Handles are cheap clones of the same underlying transport resource, so a
/// registry snapshot can be written to while the registry itself mutates.
pub trait BroadcastStream: Clone + Send + Sync + 'static {
    /// Write a frame to the stream's writable half.
    ///
    /// Must fail fast on a broken pipe or closed resource rather than
    /// buffering indefinitely.
    fn write(&self, frame: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    /// Resolves when either half of the stream terminates.
    ///
    /// `Err` carries the transport error when the stream closed abnormally.
    fn closed(&self) -> impl Future<Output = io::Result<()>> + Send;
}

/// A logical client connection capable of hosting streams.
pub trait BroadcastSession: Clone + Send + Sync + 'static {
    /// Stream type produced by this session
    type Stream: BroadcastStream;

    /// Resolves once the session is established and may create streams.
    fn ready(&self) -> impl Future<Output = io::Result<()>> + Send;

    /// Resolves when the session terminates, cleanly (`Ok`) or not (`Err`).
    fn closed(&self) -> impl Future<Output = io::Result<()>> + Send;

    /// Open a bidirectional stream on this session.
    fn create_bidirectional_stream(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;

    /// Synchronous observation of the closed state, used by the fan-out
    /// path to skip a dead session before attempting any stream write.
    fn is_closed(&self) -> bool;
}

/// Source of accepted sessions.
pub trait SessionTransport: Send + Sync + 'static {
    /// Session type produced by this transport
    type Session: BroadcastSession;

    /// Accept the next session.
    ///
    /// Returns `Ok(None)` when the transport has no further sessions
    /// (end-of-stream) and `Err` when the accept itself failed. Both end
    /// the accept loop; already-registered sessions are unaffected.
    fn accept_session(&self)
        -> impl Future<Output = io::Result<Option<Self::Session>>> + Send;
}
