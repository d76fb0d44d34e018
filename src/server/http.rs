//! HTTP listener
//!
//! Serves the gated router until Ctrl+C or cancellation.

use crate::error::TransportError;
use crate::server::{AppState, gate_middleware};
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware;
use axum::response::Response;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Default port for the gated listener
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind to (e.g., "127.0.0.1:8080")
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_HTTP_PORT)),
        }
    }
}

impl HttpConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self { bind }
    }

    /// Create config from host and port strings
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, TransportError> {
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self::new(addr))
    }
}

/// A server started by `run_http`
pub struct RunningServer {
    /// Address actually bound (port 0 resolves here)
    pub addr: SocketAddr,
    /// Cancel to begin graceful shutdown
    pub shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningServer {
    /// Cancel and wait for in-flight requests to drain
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "HTTP server task failed");
        }
    }
}

/// Gate middleware in front of the upstream proxy
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    state.proxy.forward(request).await
}

/// Start serving in the background
///
/// Returns once the listener is bound.
pub async fn run_http(state: AppState, config: HttpConfig) -> anyhow::Result<RunningServer> {
    let listener = TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;

    info!(upstream = %state.proxy.base_url(), "Gatekeeper listening on http://{}", addr);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let app = build_router(state);

    let handle = tokio::spawn(async move {
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await;

        if let Err(e) = served {
            error!(error = %e, "HTTP server error");
        }
    });

    Ok(RunningServer {
        addr,
        shutdown,
        handle,
    })
}

/// Run the server and wait for Ctrl+C or cancellation
pub async fn run_http_blocking(server: RunningServer) -> anyhow::Result<()> {
    info!("Press Ctrl+C to stop the server");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = server.shutdown.cancelled() => {
            info!("Server cancelled");
        }
    }

    server.stop().await;

    info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.bind.port(), DEFAULT_HTTP_PORT);
        assert_eq!(config.bind.ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_http_config_from_host_port() {
        let config = HttpConfig::from_host_port("0.0.0.0", 9000).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert!(matches!(
            HttpConfig::from_host_port("invalid", 1),
            Err(TransportError::Bind(_))
        ));
    }
}
