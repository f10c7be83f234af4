//! Periodic broadcast tick
//!
//! One scheduler tick reads the next chunk from the audio cursor, frames it
//! with the current wall-clock timestamp, and fans it out to a registry
//! snapshot. Ticks are serialized: the tick body runs to completion inside
//! a single task, and a tick that would fire while the previous one is
//! still broadcasting is skipped rather than queued or overlapped.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::AudioCursor;
use crate::protocol;
use crate::registry::SessionRegistry;
use crate::stats::ServerMetrics;
use crate::transport::BroadcastSession;

use super::fanout::Broadcaster;

/// Milliseconds since the Unix epoch
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Owns the periodic tick that drives the broadcast.
///
/// States: `Stopped -> Running` (first session registration or explicit
/// [`start`](Self::start)) `-> Stopped` (explicit [`stop`](Self::stop) or
/// shutdown). Nothing in between.
pub struct BroadcastScheduler<S: BroadcastSession> {
    registry: Arc<SessionRegistry<S>>,
    metrics: Arc<ServerMetrics>,
    chunk_size: usize,
    tick_interval: Duration,
    write_timeout: Duration,
    state: Mutex<SchedulerState>,
}

struct SchedulerState {
    /// Present while stopped; moved into the tick task on start. The tick
    /// task is the cursor's only writer, so the position needs no lock.
    cursor: Option<AudioCursor>,
    handle: Option<JoinHandle<()>>,
}

impl<S: BroadcastSession> BroadcastScheduler<S> {
    /// Create a stopped scheduler over an opened cursor
    pub fn new(
        cursor: AudioCursor,
        registry: Arc<SessionRegistry<S>>,
        metrics: Arc<ServerMetrics>,
        chunk_size: usize,
        tick_interval: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metrics,
            chunk_size,
            tick_interval,
            write_timeout,
            state: Mutex::new(SchedulerState {
                cursor: Some(cursor),
                handle: None,
            }),
        }
    }

    /// Start the periodic tick.
    ///
    /// Idempotent: starting an already-running scheduler is a no-op. After
    /// [`stop`](Self::stop) the audio handle has been released and the
    /// scheduler cannot be restarted; shutdown is non-recoverable.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();

        if state.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let cursor = match state.cursor.take() {
            Some(cursor) => cursor,
            None => {
                tracing::warn!("Scheduler already shut down, not restarting");
                return;
            }
        };

        tracing::info!(
            source_bytes = cursor.len(),
            chunk_size = self.chunk_size,
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Starting audio broadcast"
        );

        let broadcaster = Broadcaster::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            self.write_timeout,
        );
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);
        let chunk_size = self.chunk_size;
        let tick_interval = self.tick_interval;

        state.handle = Some(tokio::spawn(async move {
            run_ticks(cursor, broadcaster, registry, metrics, chunk_size, tick_interval).await;
        }));
    }

    /// Cancel the pending tick and release the timer and audio handle.
    ///
    /// Safe to call multiple times. In-flight writes are not drained.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();

        if let Some(handle) = state.handle.take() {
            handle.abort();
            tracing::info!("Audio broadcast stopped");
        }
    }

    /// Whether the tick task is currently running
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

async fn run_ticks<S: BroadcastSession>(
    mut cursor: AudioCursor,
    broadcaster: Broadcaster<S>,
    registry: Arc<SessionRegistry<S>>,
    metrics: Arc<ServerMetrics>,
    chunk_size: usize,
    tick_interval: Duration,
) {
    // Delay-first cadence; a tick landing while the previous one is still
    // in flight is skipped.
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + tick_interval,
        tick_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match cursor.next_chunk(chunk_size).await {
            Ok(chunk) if chunk.is_empty() => {
                tracing::info!("Audio source exhausted, restarting from the top");
            }
            Ok(chunk) => {
                let frame = protocol::encode(&chunk, unix_millis());
                let snapshot = registry.snapshot().await;
                let sessions = snapshot.len();
                let report = broadcaster.fanout(snapshot, frame).await;
                metrics.record_chunk(chunk.len());

                tracing::debug!(
                    bytes = chunk.len(),
                    position = cursor.position(),
                    sessions = sessions,
                    delivered = report.delivered,
                    streams_pruned = report.streams_pruned,
                    sessions_pruned = report.sessions_pruned,
                    "Broadcast tick"
                );
            }
            Err(e) => {
                // Position is unchanged; the next tick retries this offset.
                tracing::warn!(error = %e, "Audio read failed, skipping tick");
            }
        }
    }
}
