//! Dojo Gatekeeper
//!
//! Request gatekeeper in front of the Go Dojo application.

use clap::Parser;
use dojo_gatekeeper::{
    access::build_provider,
    config::{LogFormat, load_config, validate_config},
    gate::Gatekeeper,
    metrics::{DEFAULT_METRICS_PORT, GateMetrics, MetricsServerConfig, run_metrics},
    rate_limit::build_store,
    server::{AppState, HttpConfig, run_http, run_http_blocking},
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dojo Gatekeeper - locale, rate limiting, sessions and access control in one pipeline
#[derive(Parser, Debug)]
#[command(name = "dojo-gatekeeper")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "DOJO_GATE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DOJO_GATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Listener host
    #[arg(long, env = "DOJO_GATE_HOST")]
    host: Option<String>,

    /// Listener port
    #[arg(long, env = "DOJO_GATE_PORT")]
    port: Option<u16>,

    /// Upstream application URL
    #[arg(long, env = "DOJO_GATE_UPSTREAM")]
    upstream: Option<String>,

    /// Disable the metrics endpoint
    #[arg(long, env = "DOJO_GATE_NO_METRICS")]
    no_metrics: bool,

    /// Metrics host
    #[arg(long, env = "DOJO_GATE_METRICS_HOST")]
    metrics_host: Option<String>,

    /// Metrics port
    #[arg(long, env = "DOJO_GATE_METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(upstream) = args.upstream {
        config.upstream.url = upstream;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    validate_config(&config)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting Dojo gatekeeper"
    );

    let store = build_store(&config.rate_limits).await;
    info!(backend = store.backend(), "Rate limit counters ready");

    let provider = build_provider(&config.access)
        .inspect_err(|e| error!(error = %e, "Failed to create access provider"))?;
    info!(provider = provider.provider_type(), "Access provider ready");

    let gate = Arc::new(
        Gatekeeper::new(&config, provider, store)
            .inspect_err(|e| error!(error = %e, "Failed to build gatekeeper"))?,
    );

    let metrics = Arc::new(GateMetrics::with_capacity(config.metrics.recent_capacity));
    let state = AppState::new(&config, gate, metrics.clone())?;

    let http_config = HttpConfig::from_host_port(&config.server.host, config.server.port)?;
    let server = run_http(state, http_config).await?;

    let metrics_enabled = !args.no_metrics && config.metrics.enabled;
    let metrics_handle = if metrics_enabled {
        let metrics_config = MetricsServerConfig::new(
            args.metrics_host.as_deref().unwrap_or(&config.metrics.host),
            args.metrics_port.unwrap_or(config.metrics.port),
        )
        .unwrap_or_else(|e| {
            error!(error = %e, "Invalid metrics address, using 127.0.0.1:{}", DEFAULT_METRICS_PORT);
            MetricsServerConfig::default()
        });

        let shutdown = server.shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = run_metrics(metrics_config, metrics, shutdown).await {
                error!(error = %e, "Metrics server error");
            }
        }))
    } else {
        info!("Metrics endpoint is disabled");
        None
    };

    run_http_blocking(server).await?;

    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    Ok(())
}
