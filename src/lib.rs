//! Synchronized looping-audio broadcast server core
//!
//! Broadcasts a continuously-looping audio source in fixed-size chunks to a
//! dynamically changing set of connected sessions, embedding a wall-clock
//! timestamp in every chunk so independently-connected clients can
//! synchronize playback. One failing peer never disrupts delivery to the
//! others: failed streams and closed sessions are pruned from the registry
//! while the fan-out continues.
//!
//! The session/stream transport itself (QUIC/WebTransport or an in-process
//! loopback) is provided externally through the capability traits in
//! [`transport`].
//!
//! # Architecture
//!
//! ```text
//!  [SessionTransport] ──accept──► [BroadcastServer]
//!                                      │ add_session / add_stream
//!                                      ▼
//!  [closed watchers] ──prune──► [SessionRegistry]
//!                                      │ snapshot()
//!                                      ▼
//!  [BroadcastScheduler] ─tick─► AudioCursor ─► packet::encode ─► [Broadcaster]
//!                                                                    │
//!                                              write to every stream ┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use radiocast::{BroadcastServer, ServerConfig};
//! # use radiocast::transport::SessionTransport;
//! # async fn example<T: SessionTransport>(transport: T) -> radiocast::Result<()> {
//! let config = ServerConfig::default()
//!     .audio_path("data/uploads/radio-los-santos.mp3");
//!
//! let server = BroadcastServer::new(config, transport);
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await
//! # }
//! ```

pub mod audio;
pub mod broadcast;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;
pub mod tracks;
pub mod transport;

pub use audio::AudioCursor;
pub use broadcast::{Broadcaster, BroadcastScheduler, FanoutReport};
pub use error::{Error, Result};
pub use protocol::{PacketError, SyncPacket};
pub use registry::{SessionRegistry, SessionSnapshot};
pub use server::{BroadcastServer, ServerConfig};
pub use stats::{MetricsSnapshot, ServerMetrics};
