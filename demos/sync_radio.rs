//! Synchronized radio demo with an in-process loopback transport
//!
//! Run with: cargo run --example sync_radio [AUDIO_FILE]
//!
//! Examples:
//!   cargo run --example sync_radio                  # synthesized source
//!   cargo run --example sync_radio loop.mp3         # broadcast loop.mp3
//!
//! Three listeners connect over a loopback transport and print every chunk
//! they receive together with the embedded timestamp and their local
//! receive drift. A few seconds in, one listener hangs up to show that the
//! server prunes it without disturbing the others. Press Ctrl+C to stop.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::{mpsc, watch, Mutex};

use radiocast::protocol;
use radiocast::transport::{BroadcastSession, BroadcastStream, SessionTransport};
use radiocast::{BroadcastServer, ServerConfig};

/// Server-side writable half of a loopback stream; the client holds the
/// receiving end.
#[derive(Clone)]
struct LoopbackStream {
    tx: mpsc::Sender<Bytes>,
}

impl BroadcastStream for LoopbackStream {
    async fn write(&self, frame: Bytes) -> io::Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "listener hung up"))
    }

    async fn closed(&self) -> io::Result<()> {
        self.tx.closed().await;
        Ok(())
    }
}

/// One loopback client connection
#[derive(Clone)]
struct LoopbackSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    name: String,
    /// New stream receivers handed to the client task
    streams_tx: mpsc::Sender<mpsc::Receiver<Bytes>>,
    closed: watch::Sender<bool>,
}

impl LoopbackSession {
    fn new(name: &str) -> (Self, mpsc::Receiver<mpsc::Receiver<Bytes>>) {
        let (streams_tx, streams_rx) = mpsc::channel(4);
        let session = Self {
            inner: Arc::new(SessionInner {
                name: name.to_string(),
                streams_tx,
                closed: watch::channel(false).0,
            }),
        };
        (session, streams_rx)
    }

    fn hang_up(&self) {
        self.inner.closed.send_replace(true);
    }
}

impl BroadcastSession for LoopbackSession {
    type Stream = LoopbackStream;

    async fn ready(&self) -> io::Result<()> {
        Ok(())
    }

    async fn closed(&self) -> io::Result<()> {
        let mut rx = self.inner.closed.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn create_bidirectional_stream(&self) -> io::Result<LoopbackStream> {
        let (tx, rx) = mpsc::channel(8);
        self.inner
            .streams_tx
            .send(rx)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "listener gone"))?;
        Ok(LoopbackStream { tx })
    }

    fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }
}

/// Loopback transport fed from the demo's connect calls
struct LoopbackTransport {
    rx: Mutex<mpsc::Receiver<LoopbackSession>>,
}

impl LoopbackTransport {
    fn new() -> (Self, mpsc::Sender<LoopbackSession>) {
        let (tx, rx) = mpsc::channel(16);
        (Self { rx: Mutex::new(rx) }, tx)
    }
}

impl SessionTransport for LoopbackTransport {
    type Session = LoopbackSession;

    async fn accept_session(&self) -> io::Result<Option<LoopbackSession>> {
        Ok(self.rx.lock().await.recv().await)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Connect a listener: queue its session for the accept loop and spawn the
/// task that decodes every received chunk.
async fn connect(name: &str, sessions: &mpsc::Sender<LoopbackSession>) -> LoopbackSession {
    let (session, mut streams_rx) = LoopbackSession::new(name);
    sessions.send(session.clone()).await.expect("server gone");

    let name = session.inner.name.clone();
    tokio::spawn(async move {
        while let Some(mut frames) = streams_rx.recv().await {
            while let Some(frame) = frames.recv().await {
                match protocol::decode(&frame) {
                    Ok(packet) => {
                        let drift = unix_millis().saturating_sub(packet.timestamp_ms);
                        println!(
                            "[{}] {} bytes @ t={} (drift {} ms)",
                            name,
                            packet.payload.len(),
                            packet.timestamp_ms,
                            drift
                        );
                    }
                    Err(e) => eprintln!("[{}] bad frame: {}", name, e),
                }
            }
        }
    });

    session
}

/// Write a synthesized audio-like source so the demo runs standalone
fn synthesize_source(dir: &std::path::Path) -> io::Result<PathBuf> {
    use std::io::Write;

    let path = dir.join("synth-loop.bin");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::File::create(&path)?.write_all(&data)?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("radiocast=debug".parse()?)
                .add_directive("sync_radio=info".parse()?),
        )
        .init();

    let tmp = tempfile::tempdir()?;
    let audio_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => synthesize_source(tmp.path())?,
    };

    let config = ServerConfig::default()
        .audio_path(&audio_path)
        .chunk_size(32 * 1024)
        .tick_interval(Duration::from_secs(1))
        .write_timeout(Duration::from_secs(2));

    println!("Broadcasting {} in 32 KiB chunks every second", audio_path.display());
    println!("Press Ctrl+C to stop");
    println!();

    let (transport, sessions) = LoopbackTransport::new();
    let server = BroadcastServer::new(config, transport);

    let _alice = connect("alice", &sessions).await;
    let _bob = connect("bob", &sessions).await;
    let carol = connect("carol", &sessions).await;

    // Carol leaves mid-broadcast; the server prunes her session while the
    // others keep receiving.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(6)).await;
        println!("[carol] hanging up");
        carol.hang_up();
    });

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    let stats = server.metrics().snapshot();
    println!(
        "Broadcast {} chunks / {} bytes to {} sessions ({} removed) over {:?}",
        stats.chunks_broadcast,
        stats.bytes_broadcast,
        stats.sessions_accepted,
        stats.sessions_removed,
        stats.uptime
    );

    Ok(())
}
