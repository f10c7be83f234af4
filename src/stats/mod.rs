//! Server statistics

pub mod metrics;

pub use metrics::{MetricsSnapshot, ServerMetrics};
