//! Metrics module
//!
//! Counts gate decisions and serves them as JSON on a separate listener.

pub mod collector;
pub mod server;

pub use collector::{Count, DecisionRecord, GateMetrics, MetricsSnapshot};
pub use server::{DEFAULT_METRICS_PORT, MetricsServerConfig, metrics_router, run_metrics};
