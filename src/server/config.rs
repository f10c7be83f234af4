//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default broadcast chunk size: 64 KB
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default spacing between broadcast ticks: one chunk every 2 seconds
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: SocketAddr,

    /// Bytes of audio broadcast per tick
    pub chunk_size: usize,

    /// Spacing between broadcast ticks
    pub tick_interval: Duration,

    /// Bound on each stream write; a consumer that cannot take the frame
    /// in time is pruned
    pub write_timeout: Duration,

    /// TLS certificate path, forwarded to the transport layer
    pub cert_path: PathBuf,

    /// TLS private key path, forwarded to the transport layer
    pub key_path: PathBuf,

    /// Root directory for uploaded track files
    pub uploads_root: PathBuf,

    /// Audio source file to broadcast
    pub audio_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4433".parse().unwrap(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            write_timeout: Duration::from_secs(5),
            cert_path: PathBuf::from("certs/server.crt"),
            key_path: PathBuf::from("certs/server.key"),
            uploads_root: PathBuf::from("data/uploads"),
            audio_path: PathBuf::from("data/uploads/radio-los-santos.mp3"),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the broadcast chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the tick interval
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the per-stream write bound
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the TLS certificate and key paths
    pub fn tls_paths(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert_path = cert.into();
        self.key_path = key.into();
        self
    }

    /// Set the uploads root directory
    pub fn uploads_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.uploads_root = root.into();
        self
    }

    /// Set the audio source file
    pub fn audio_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_path = path.into();
        self
    }
}
