//! Dojo Gatekeeper
//!
//! A request gatekeeper for the Go Dojo learning platform. Every request is
//! evaluated once and leaves with exactly one verdict: allow, redirect,
//! rewrite or reject.
//!
//! ## Features
//!
//! - **Locale routing** - prefixed paths, cookie and `Accept-Language` negotiation
//! - **Rate limiting** - fixed windows per scope over Redis or in-memory counters
//! - **Session and RBAC** - cookie presence plus a configurable role hierarchy
//! - **Remote access control** - maintenance, IP blocklist and bans, fail-open
//! - **Fallback strategy** - pages fail open, mutating API calls fail closed
//!
//! ## Pipeline
//!
//! ```text
//! bypass → classify → access → rate limit → session → ban → RBAC → forward
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! [upstream]
//! url = "http://127.0.0.1:3000"
//!
//! [locales]
//! default = "ru"
//! supported = ["ru", "en"]
//!
//! [rate_limits]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//!
//! [rate_limits.auth]
//! limit = 20
//! window_secs = 900
//!
//! [access]
//! provider = "http"
//! http.url = "https://config.example.com/access"
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod rate_limit;
pub mod rbac;
pub mod response;
pub mod routing;
pub mod server;
pub mod session;

// Re-export main types
pub use config::{GateConfig, load_config};
pub use error::{GateError, Result};
pub use gate::{GateDecision, GateVerdict, Gatekeeper, RequestContext};
pub use metrics::GateMetrics;
pub use server::{AppState, build_router};
