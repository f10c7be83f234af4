//! Per-session registry entries and snapshot types

use std::collections::HashMap;

use crate::transport::BroadcastSession;

use super::store::{SessionId, StreamId};

/// Lifecycle phase of a registered session.
///
/// `Closed` is terminal and never stored: a closed session is removed from
/// the registry rather than parked in a closed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Registered, awaiting the transport's ready notification
    Pending,
    /// Ready; may hold streams
    Ready,
}

/// Registry entry for a single session
pub(super) struct SessionEntry<S: BroadcastSession> {
    /// Transport handle; the registry holds a reference, not ownership of
    /// the underlying connection.
    pub(super) session: S,

    /// Current lifecycle phase
    pub(super) phase: SessionPhase,

    /// Open streams keyed by registry-allocated stream id
    pub(super) streams: HashMap<StreamId, S::Stream>,
}

impl<S: BroadcastSession> SessionEntry<S> {
    pub(super) fn new(session: S) -> Self {
        Self {
            session,
            phase: SessionPhase::Pending,
            streams: HashMap::new(),
        }
    }
}

/// Point-in-time copy of one session's membership, safe to iterate while
/// the registry is concurrently mutated.
#[derive(Clone)]
pub struct SessionSnapshot<S: BroadcastSession> {
    /// Session id
    pub session_id: SessionId,
    /// Cloned session handle
    pub session: S,
    /// Cloned stream handles, ordered by stream id
    pub streams: Vec<(StreamId, S::Stream)>,
}
