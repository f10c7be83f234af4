//! Broadcast server
//!
//! Accepts sessions from the transport, keeps the registry consistent with
//! real connection state, and drives the broadcast scheduler.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::BroadcastServer;
