//! HTTP surface
//!
//! The gatekeeper runs as axum middleware in front of a reverse proxy to the
//! application.

pub mod http;
pub mod middleware;
pub mod proxy;

pub use http::{
    DEFAULT_HTTP_PORT, HttpConfig, RunningServer, build_router, run_http, run_http_blocking,
};
pub use middleware::{gate_middleware, rewrite_uri};
pub use proxy::UpstreamProxy;

use crate::config::GateConfig;
use crate::error::Result;
use crate::gate::{Gatekeeper, TrustedProxies};
use crate::metrics::GateMetrics;
use crate::response::ResponseComposer;
use std::sync::Arc;

/// Shared state of the gated router
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<Gatekeeper>,
    pub composer: Arc<ResponseComposer>,
    pub proxy: Arc<UpstreamProxy>,
    pub metrics: Arc<GateMetrics>,
    /// Scheme assumed when no `x-forwarded-proto` header is present
    pub public_scheme: Arc<str>,
    /// Peers whose client-IP headers are believed
    pub trusted_proxies: Arc<TrustedProxies>,
}

impl AppState {
    pub fn new(
        config: &GateConfig,
        gate: Arc<Gatekeeper>,
        metrics: Arc<GateMetrics>,
    ) -> Result<Self> {
        Ok(Self {
            gate,
            composer: Arc::new(ResponseComposer::new(
                &config.headers,
                &config.pages,
                config.server.is_production(),
            )),
            proxy: Arc::new(UpstreamProxy::new(&config.upstream)?),
            metrics,
            public_scheme: Arc::from(config.server.public_scheme.as_str()),
            trusted_proxies: Arc::new(TrustedProxies::parse(&config.server.trusted_proxies)?),
        })
    }
}
