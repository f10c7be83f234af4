//! Statistics and metrics for the broadcast server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide counters, updated by the accept loop and the fan-out path.
///
/// All counters are monotonic; live membership counts come from the
/// registry itself.
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: Instant,
    /// Sessions ever accepted
    sessions_accepted: AtomicU64,
    /// Sessions removed (clean close or pruned on failure)
    sessions_removed: AtomicU64,
    /// Streams ever opened
    streams_opened: AtomicU64,
    /// Streams removed (closed or pruned on write failure)
    streams_removed: AtomicU64,
    /// Broadcast ticks that delivered a chunk
    chunks_broadcast: AtomicU64,
    /// Total payload bytes handed to the fan-out path
    bytes_broadcast: AtomicU64,
    /// Individual stream writes that failed or timed out
    write_failures: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub sessions_accepted: u64,
    pub sessions_removed: u64,
    pub streams_opened: u64,
    pub streams_removed: u64,
    pub chunks_broadcast: u64,
    pub bytes_broadcast: u64,
    pub write_failures: u64,
    pub uptime: Duration,
}

impl ServerMetrics {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            sessions_accepted: AtomicU64::new(0),
            sessions_removed: AtomicU64::new(0),
            streams_opened: AtomicU64::new(0),
            streams_removed: AtomicU64::new(0),
            chunks_broadcast: AtomicU64::new(0),
            bytes_broadcast: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn record_session_accepted(&self) {
        self.sessions_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_removed(&self) {
        self.sessions_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_removed(&self) {
        self.streams_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one delivered broadcast tick of `bytes` payload bytes
    pub fn record_chunk(&self, bytes: usize) {
        self.chunks_broadcast.fetch_add(1, Ordering::Relaxed);
        self.bytes_broadcast.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Time since the metrics tracker was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_accepted: self.sessions_accepted.load(Ordering::Relaxed),
            sessions_removed: self.sessions_removed.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            streams_removed: self.streams_removed.load(Ordering::Relaxed),
            chunks_broadcast: self.chunks_broadcast.load(Ordering::Relaxed),
            bytes_broadcast: self.bytes_broadcast.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            uptime: self.uptime(),
        }
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
