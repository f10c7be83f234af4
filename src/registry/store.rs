//! Session registry implementation
//!
//! The central membership table for all live sessions and their streams.
//! Mutated from three independent call sites (accept loop, closed-watcher
//! callbacks, broadcaster failure cleanup), so every operation goes through
//! the internal `RwLock`; `snapshot` never observes a partially-applied
//! removal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::transport::BroadcastSession;

use super::entry::{SessionEntry, SessionPhase, SessionSnapshot};

/// Identifier allocated by the accept loop for each session
pub type SessionId = u64;

/// Identifier allocated by the registry for each stream
pub type StreamId = u64;

/// Concurrency-safe membership table of sessions and their streams
pub struct SessionRegistry<S: BroadcastSession> {
    /// Map of session id to entry
    sessions: RwLock<HashMap<SessionId, SessionEntry<S>>>,

    /// Next stream id to allocate
    next_stream_id: AtomicU64,
}

impl<S: BroadcastSession> SessionRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_stream_id: AtomicU64::new(1),
        }
    }

    /// Register a session with an empty stream set, phase `Pending`.
    ///
    /// No-op if the id is already present.
    pub async fn add_session(&self, session_id: SessionId, session: S) {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&session_id) {
            return;
        }
        sessions.insert(session_id, SessionEntry::new(session));

        tracing::info!(
            session_id = session_id,
            sessions = sessions.len(),
            "Session registered"
        );
    }

    /// Transition a session from `Pending` to `Ready`.
    ///
    /// No-op if the session is absent. Returns whether the transition
    /// happened.
    pub async fn mark_ready(&self, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(&session_id) {
            Some(entry) => {
                entry.phase = SessionPhase::Ready;
                true
            }
            None => false,
        }
    }

    /// Remove a session and all its streams.
    ///
    /// Idempotent; returns whether the session was present.
    pub async fn remove_session(&self, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;

        match sessions.remove(&session_id) {
            Some(entry) => {
                tracing::info!(
                    session_id = session_id,
                    streams_dropped = entry.streams.len(),
                    sessions = sessions.len(),
                    "Session removed"
                );
                true
            }
            None => false,
        }
    }

    /// Insert a stream under a session, allocating a stream id.
    ///
    /// Returns `None` if the session is absent, in which case the stream is
    /// dropped here and the caller is responsible for closing it: an
    /// accept-then-immediate-close race must not leak a stream into a
    /// destroyed session's entry.
    pub async fn add_stream(&self, session_id: SessionId, stream: S::Stream) -> Option<StreamId> {
        let mut sessions = self.sessions.write().await;

        let entry = match sessions.get_mut(&session_id) {
            Some(entry) => entry,
            None => {
                tracing::debug!(
                    session_id = session_id,
                    "Dropping stream for unregistered session"
                );
                return None;
            }
        };

        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        entry.streams.insert(stream_id, stream);

        tracing::info!(
            session_id = session_id,
            stream_id = stream_id,
            "Stream registered"
        );
        Some(stream_id)
    }

    /// Remove a stream from a session's set.
    ///
    /// Idempotent; removing the last stream does not remove the session.
    /// Returns whether the stream was present.
    pub async fn remove_stream(&self, session_id: SessionId, stream_id: StreamId) -> bool {
        let mut sessions = self.sessions.write().await;

        let entry = match sessions.get_mut(&session_id) {
            Some(entry) => entry,
            None => return false,
        };

        if entry.streams.remove(&stream_id).is_some() {
            tracing::debug!(
                session_id = session_id,
                stream_id = stream_id,
                remaining = entry.streams.len(),
                "Stream removed"
            );
            true
        } else {
            false
        }
    }

    /// Immutable point-in-time copy of the membership, ordered by session
    /// id (streams by stream id), safe to iterate while the registry is
    /// concurrently mutated.
    pub async fn snapshot(&self) -> Vec<SessionSnapshot<S>> {
        let sessions = self.sessions.read().await;

        let mut snapshot: Vec<SessionSnapshot<S>> = sessions
            .iter()
            .map(|(&session_id, entry)| {
                let mut streams: Vec<_> = entry
                    .streams
                    .iter()
                    .map(|(&stream_id, stream)| (stream_id, stream.clone()))
                    .collect();
                streams.sort_by_key(|(stream_id, _)| *stream_id);

                SessionSnapshot {
                    session_id,
                    session: entry.session.clone(),
                    streams,
                }
            })
            .collect();

        snapshot.sort_by_key(|s| s.session_id);
        snapshot
    }

    /// Current phase of a session, if registered
    pub async fn phase(&self, session_id: SessionId) -> Option<SessionPhase> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|entry| entry.phase)
    }

    /// Number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Total number of registered streams across all sessions
    pub async fn stream_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .map(|entry| entry.streams.len())
            .sum()
    }

    /// Whether no sessions are registered
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl<S: BroadcastSession> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
