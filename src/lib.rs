//! In-process HTTP request metrics.
//!
//! Wrap a service with [`StatsLayer`] (or [`middleware::stats_middleware`])
//! and every request updates a shared [`Stats`]: a per-second status-code
//! histogram, a cumulative one, and cumulative/average latency. Serve
//! [`Stats::snapshot`] from wherever the host likes, usually `/stats`.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;

pub use config::{ConfigError, ServerConfig, StatsConfig};
pub use metrics::{Stats, StatsSnapshot};
pub use middleware::{Recorder, RecordingSink, ResponseBuffer, ResponseSink, StatsLayer, StatsService};
