//! Metrics HTTP server
//!
//! Serves the metrics snapshot as JSON on its own listener, away from the
//! gated traffic.

use crate::config::MetricsConfig;
use crate::metrics::collector::{GateMetrics, MetricsSnapshot};
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Default port for the metrics server
pub const DEFAULT_METRICS_PORT: u16 = 9464;

/// Metrics server configuration
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub bind: SocketAddr,
    pub enabled: bool,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_METRICS_PORT)),
            enabled: true,
        }
    }
}

impl MetricsServerConfig {
    pub fn new(host: &str, port: u16) -> Result<Self, std::net::AddrParseError> {
        let bind: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self {
            bind,
            enabled: true,
        })
    }

    pub fn from_config(config: &MetricsConfig) -> Result<Self, std::net::AddrParseError> {
        Ok(Self {
            enabled: config.enabled,
            ..Self::new(&config.host, config.port)?
        })
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

/// Routes of the metrics server
pub fn metrics_router(metrics: Arc<GateMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(api_metrics))
        .route("/health", get(health))
        .with_state(metrics)
}

/// Run the metrics server until `shutdown` is cancelled
pub async fn run_metrics(
    config: MetricsServerConfig,
    metrics: Arc<GateMetrics>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    if !config.enabled {
        info!("Metrics server is disabled");
        return Ok(());
    }

    let listener = TcpListener::bind(config.bind).await?;
    info!("Metrics server running at http://{}", config.bind);

    axum::serve(listener, metrics_router(metrics))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

async fn api_metrics(State(metrics): State<Arc<GateMetrics>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

async fn health(State(metrics): State<Arc<GateMetrics>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: metrics.uptime().as_secs(),
    })
}
