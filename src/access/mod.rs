//! Remote-configurable access control
//!
//! Maintenance mode, IP blocklist and per-user bans. The `AccessGate` is the
//! only consumer of providers and turns every provider failure into a
//! degraded all-clear.
//!
//! ## Example Configuration
//!
//! ```toml
//! [access]
//! provider = "http"
//! timeout_ms = 200
//!
//! [access.http]
//! url = "https://config.example.com/gate.json"   # or ACCESS_CONFIG_URL
//! cache_ttl_secs = 10
//! ```

pub mod gate;
pub mod http;
pub mod provider;

pub use gate::{AccessCheck, AccessGate, AccessOutcome};
pub use http::{AccessDocument, HttpAccessProvider, MaintenanceWindow, SecurityFlags};
pub use provider::{AccessDecision, AccessProvider, StaticAccessProvider};

use crate::config::{AccessConfig, AccessProviderKind};
use crate::error::ProviderResult;
use std::sync::Arc;

/// Build the configured provider
pub fn build_provider(config: &AccessConfig) -> ProviderResult<Arc<dyn AccessProvider>> {
    Ok(match config.provider {
        AccessProviderKind::Static => Arc::new(StaticAccessProvider::new(&config.static_rules)),
        AccessProviderKind::Http => Arc::new(HttpAccessProvider::new(config)?),
    })
}
