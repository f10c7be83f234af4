//! Packet fan-out with per-target failure isolation
//!
//! The broadcaster walks a registry snapshot and writes the same frame to
//! every stream. Removal decisions are collected during the walk and
//! applied to the registry only after the snapshot has been fully
//! traversed, so registry mutation never interleaves with in-flight
//! iteration over the same snapshot.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Error;
use crate::registry::{SessionId, SessionRegistry, SessionSnapshot, StreamId};
use crate::stats::ServerMetrics;
use crate::transport::{BroadcastSession, BroadcastStream};

/// Outcome of one fan-out pass, for logging and stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Streams that received the frame
    pub delivered: usize,
    /// Streams pruned after a failed or timed-out write
    pub streams_pruned: usize,
    /// Sessions pruned after being observed closed
    pub sessions_pruned: usize,
}

/// Writes framed packets to every stream in a registry snapshot
pub struct Broadcaster<S: BroadcastSession> {
    registry: Arc<SessionRegistry<S>>,
    metrics: Arc<ServerMetrics>,
    write_timeout: Duration,
}

impl<S: BroadcastSession> Broadcaster<S> {
    /// Create a broadcaster over the given registry.
    ///
    /// `write_timeout` bounds each stream write; a consumer that cannot
    /// take the frame in time is pruned, not throttled.
    pub fn new(
        registry: Arc<SessionRegistry<S>>,
        metrics: Arc<ServerMetrics>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metrics,
            write_timeout,
        }
    }

    /// Deliver one frame to every stream in the snapshot.
    ///
    /// A session observed closed before any of its writes is marked for
    /// removal whole and skipped. A failed write marks that stream (only)
    /// for removal and the loop continues with the remaining streams and
    /// sessions. Never fails: every error is terminal only for the target
    /// it occurred on.
    pub async fn fanout(&self, snapshot: Vec<SessionSnapshot<S>>, frame: Bytes) -> FanoutReport {
        let mut dead_sessions: Vec<SessionId> = Vec::new();
        let mut dead_streams: Vec<(SessionId, StreamId)> = Vec::new();
        let mut delivered = 0;

        for entry in &snapshot {
            if entry.session.is_closed() {
                tracing::debug!(
                    session_id = entry.session_id,
                    "Session observed closed, skipping"
                );
                dead_sessions.push(entry.session_id);
                continue;
            }

            for (stream_id, stream) in &entry.streams {
                match tokio::time::timeout(self.write_timeout, stream.write(frame.clone())).await {
                    Ok(Ok(())) => delivered += 1,
                    Ok(Err(e)) => {
                        tracing::warn!(
                            session_id = entry.session_id,
                            stream_id = *stream_id,
                            error = %Error::StreamWrite(e),
                            "Pruning stream"
                        );
                        dead_streams.push((entry.session_id, *stream_id));
                    }
                    Err(_) => {
                        tracing::warn!(
                            session_id = entry.session_id,
                            stream_id = *stream_id,
                            timeout_ms = self.write_timeout.as_millis() as u64,
                            "Stream write timed out"
                        );
                        dead_streams.push((entry.session_id, *stream_id));
                    }
                }
            }
        }

        // Apply removals only after the snapshot walk is complete.
        let mut report = FanoutReport {
            delivered,
            ..Default::default()
        };

        for (session_id, stream_id) in dead_streams {
            if self.registry.remove_stream(session_id, stream_id).await {
                self.metrics.record_write_failure();
                self.metrics.record_stream_removed();
                report.streams_pruned += 1;
            }
        }

        for session_id in dead_sessions {
            if self.registry.remove_session(session_id).await {
                self.metrics.record_session_removed();
                report.sessions_pruned += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{MockSession, MockStream};

    fn broadcaster(
        registry: &Arc<SessionRegistry<MockSession>>,
    ) -> Broadcaster<MockSession> {
        Broadcaster::new(
            Arc::clone(registry),
            Arc::new(ServerMetrics::new()),
            Duration::from_millis(100),
        )
    }

    async fn register(
        registry: &SessionRegistry<MockSession>,
        session_id: SessionId,
    ) -> (MockSession, MockStream, StreamId) {
        let session = MockSession::ready_now();
        let stream = MockStream::new();
        registry.add_session(session_id, session.clone()).await;
        let stream_id = registry.add_stream(session_id, stream.clone()).await.unwrap();
        (session, stream, stream_id)
    }

    #[tokio::test]
    async fn test_fanout_delivers_same_frame_to_all() {
        let registry = Arc::new(SessionRegistry::new());
        let (_s1, stream1, _) = register(&registry, 1).await;
        let (_s2, stream2, _) = register(&registry, 2).await;

        let frame = Bytes::from_static(b"frame");
        let report = broadcaster(&registry)
            .fanout(registry.snapshot().await, frame.clone())
            .await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.streams_pruned, 0);
        assert_eq!(stream1.written(), vec![frame.clone()]);
        assert_eq!(stream2.written(), vec![frame]);
    }

    #[tokio::test]
    async fn test_write_failure_is_isolated() {
        let registry = Arc::new(SessionRegistry::new());
        let mut streams = Vec::new();
        for id in 1..=5 {
            let (_, stream, _) = register(&registry, id).await;
            streams.push(stream);
        }
        streams[2].fail_writes();

        let report = broadcaster(&registry)
            .fanout(registry.snapshot().await, Bytes::from_static(b"x"))
            .await;

        // The other four streams still received the frame.
        assert_eq!(report.delivered, 4);
        assert_eq!(report.streams_pruned, 1);
        for (i, stream) in streams.iter().enumerate() {
            assert_eq!(stream.write_count(), usize::from(i != 2));
        }

        // Only the failing stream is gone; its session stays registered.
        assert_eq!(registry.session_count().await, 5);
        assert_eq!(registry.stream_count().await, 4);
    }

    #[tokio::test]
    async fn test_three_session_scenario() {
        // 3 sessions, each with one stream; session 2's write fails.
        let registry = Arc::new(SessionRegistry::new());
        let (_s1, stream1, _) = register(&registry, 1).await;
        let (_s2, stream2, _) = register(&registry, 2).await;
        let (_s3, stream3, _) = register(&registry, 3).await;
        stream2.fail_writes();

        let payload = Bytes::from_static(b"ABCD");
        let frame = crate::protocol::encode(&payload, 1000);
        broadcaster(&registry)
            .fanout(registry.snapshot().await, frame.clone())
            .await;

        assert_eq!(stream1.written(), vec![frame.clone()]);
        assert!(stream2.written().is_empty());
        assert_eq!(stream3.written(), vec![frame]);

        // Stream-level failure, not session-level: session 2 remains
        // registered with zero streams.
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].streams.len(), 1);
        assert_eq!(snapshot[1].streams.len(), 0);
        assert_eq!(snapshot[2].streams.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_skipped_and_pruned_whole() {
        let registry = Arc::new(SessionRegistry::new());
        let (closed_session, closed_stream, _) = register(&registry, 1).await;
        let (_s2, live_stream, _) = register(&registry, 2).await;
        closed_session.close();

        let report = broadcaster(&registry)
            .fanout(registry.snapshot().await, Bytes::from_static(b"x"))
            .await;

        // No write was attempted on the closed session's stream.
        assert!(closed_stream.written().is_empty());
        assert_eq!(live_stream.write_count(), 1);
        assert_eq!(report.sessions_pruned, 1);
        assert_eq!(report.delivered, 1);

        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.stream_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_write_times_out_and_prunes() {
        let registry = Arc::new(SessionRegistry::new());
        let (_s1, hung, _) = register(&registry, 1).await;
        let (_s2, live, _) = register(&registry, 2).await;
        hung.hang_writes();

        let report = broadcaster(&registry)
            .fanout(registry.snapshot().await, Bytes::from_static(b"x"))
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.streams_pruned, 1);
        assert_eq!(live.write_count(), 1);
        assert_eq!(registry.stream_count().await, 1);
    }

    #[tokio::test]
    async fn test_fanout_on_empty_snapshot() {
        let registry: Arc<SessionRegistry<MockSession>> = Arc::new(SessionRegistry::new());
        let report = broadcaster(&registry)
            .fanout(registry.snapshot().await, Bytes::from_static(b"x"))
            .await;
        assert_eq!(report, FanoutReport::default());
    }
}
