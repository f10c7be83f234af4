//! Broadcast server and session accept loop
//!
//! Owns every piece of broadcast state (registry, scheduler, metrics,
//! session-id allocation) as fields of one instance, so multiple servers
//! can coexist and tests can drive one in isolation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::AudioCursor;
use crate::broadcast::BroadcastScheduler;
use crate::error::{Error, Result};
use crate::registry::{SessionId, SessionRegistry, StreamId};
use crate::server::config::ServerConfig;
use crate::stats::ServerMetrics;
use crate::transport::{BroadcastSession, BroadcastStream, SessionTransport};

/// Audio broadcast server
pub struct BroadcastServer<T: SessionTransport> {
    config: ServerConfig,
    transport: T,
    registry: Arc<SessionRegistry<T::Session>>,
    metrics: Arc<ServerMetrics>,
    next_session_id: AtomicU64,
}

impl<T: SessionTransport> BroadcastServer<T> {
    /// Create a new server over an already-listening transport
    pub fn new(config: ServerConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            registry: Arc::new(SessionRegistry::new()),
            metrics: Arc::new(ServerMetrics::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry<T::Session>> {
        &self.registry
    }

    /// Get a reference to the server metrics
    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until the transport stops delivering sessions.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown.
    ///
    /// When `shutdown` resolves: the scheduler is stopped (tick cancelled),
    /// the accept loop ends, and the audio handle is released. In-flight
    /// writes are not awaited or drained.
    ///
    /// An accept failure or transport end-of-stream only stops the intake
    /// of new sessions; already-registered sessions keep receiving audio
    /// until shutdown.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let cursor = AudioCursor::open(&self.config.audio_path).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            source = %self.config.audio_path.display(),
            source_bytes = cursor.len(),
            "Broadcast server listening"
        );

        let scheduler = Arc::new(BroadcastScheduler::new(
            cursor,
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            self.config.chunk_size,
            self.config.tick_interval,
            self.config.write_timeout,
        ));

        tokio::pin!(shutdown);

        let result = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&scheduler) => {
                match &result {
                    Ok(()) => tracing::info!("Transport stopped delivering sessions"),
                    Err(e) => tracing::error!(error = %e, "Accept loop terminated"),
                }
                // Keep broadcasting to registered sessions until shutdown.
                shutdown.await;
                result
            }
        };

        scheduler.stop();
        result
    }

    async fn accept_loop(&self, scheduler: &Arc<BroadcastScheduler<T::Session>>) -> Result<()> {
        loop {
            match self.transport.accept_session().await {
                Ok(Some(session)) => self.handle_session(session, scheduler).await,
                Ok(None) => return Ok(()),
                Err(e) => return Err(Error::TransportAccept(e.to_string())),
            }
        }
    }

    async fn handle_session(
        &self,
        session: T::Session,
        scheduler: &Arc<BroadcastScheduler<T::Session>>,
    ) {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::info!(session_id = session_id, "New client session established");

        self.registry.add_session(session_id, session.clone()).await;
        self.metrics.record_session_accepted();

        // First subscriber arms the broadcast; later calls are no-ops.
        scheduler.start();

        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            watch_session(session_id, session, registry, metrics).await;
        });
    }
}

/// Drive one session from registration to removal.
///
/// Runs the ready/stream-creation flow while simultaneously watching the
/// closed notification; whichever way the session ends, it is removed from
/// the registry exactly once.
async fn watch_session<S: BroadcastSession>(
    session_id: SessionId,
    session: S,
    registry: Arc<SessionRegistry<S>>,
    metrics: Arc<ServerMetrics>,
) {
    let closed = session.closed();
    tokio::pin!(closed);

    let result = tokio::select! {
        result = &mut closed => result,
        _ = arm_session(session_id, &session, &registry, &metrics) => (&mut closed).await,
    };

    match result {
        Ok(()) => tracing::info!(session_id = session_id, "Session closed"),
        Err(e) => tracing::warn!(
            session_id = session_id,
            error = %Error::SessionClosed(Some(e)),
            "Session terminated"
        ),
    }

    if registry.remove_session(session_id).await {
        metrics.record_session_removed();
    }
}

/// Await readiness, then create and register the session's stream.
async fn arm_session<S: BroadcastSession>(
    session_id: SessionId,
    session: &S,
    registry: &Arc<SessionRegistry<S>>,
    metrics: &Arc<ServerMetrics>,
) {
    if let Err(e) = session.ready().await {
        // The session stays registered with zero streams; its closed
        // notification prunes it.
        tracing::warn!(session_id = session_id, error = %Error::SessionReady(e), "Session not armed");
        return;
    }

    registry.mark_ready(session_id).await;
    tracing::info!(session_id = session_id, "Session ready");

    let stream = match session.create_bidirectional_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            // No retry path; the session keeps zero streams until it closes.
            tracing::warn!(
                session_id = session_id,
                error = %Error::StreamCreate(e),
                "Session left without a stream"
            );
            return;
        }
    };

    match registry.add_stream(session_id, stream.clone()).await {
        Some(stream_id) => {
            metrics.record_stream_opened();

            let registry = Arc::clone(registry);
            let metrics = Arc::clone(metrics);
            tokio::spawn(async move {
                watch_stream(session_id, stream_id, stream, registry, metrics).await;
            });
        }
        None => {
            // Session vanished between accept and stream registration; the
            // handle is dropped here rather than leaked into the registry.
            tracing::debug!(
                session_id = session_id,
                "Session gone before stream registration"
            );
        }
    }
}

/// Prune a stream from the registry when its transport reports closed.
async fn watch_stream<S: BroadcastSession>(
    session_id: SessionId,
    stream_id: StreamId,
    stream: S::Stream,
    registry: Arc<SessionRegistry<S>>,
    metrics: Arc<ServerMetrics>,
) {
    match stream.closed().await {
        Ok(()) => tracing::debug!(
            session_id = session_id,
            stream_id = stream_id,
            "Stream closed"
        ),
        Err(e) => tracing::debug!(
            session_id = session_id,
            stream_id = stream_id,
            error = %e,
            "Stream closed with error"
        ),
    }

    if registry.remove_stream(session_id, stream_id).await {
        metrics.record_stream_removed();
    }
}
