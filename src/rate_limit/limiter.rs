//! Fixed-window rate limiter
//!
//! Buckets are keyed `<prefix>:<scope>:<identifier>:<window index>` so every
//! window gets a fresh counter. Store failures never block a request: the
//! limiter reports success with `degraded = true`.

use crate::config::{RateLimitConfig, ScopeLimit};
use crate::error::StoreError;
use crate::rate_limit::store::{Clock, CounterStore, SystemClock};
use crate::routing::RouteClass;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// `remaining` reported when the store could not be consulted
pub const FAIL_OPEN_REMAINING: u64 = 1000;

/// Rate-limit scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    Api,
    Auth,
    Export,
    Admin,
}

impl RateLimitScope {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Api => "api",
            RateLimitScope::Auth => "auth",
            RateLimitScope::Export => "export",
            RateLimitScope::Admin => "admin",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub success: bool,
    pub remaining: u64,
    /// Unix epoch milliseconds at which the current window ends
    pub reset_at_ms: u64,
    pub limit: u64,
    /// Store unavailable; the request was let through unchecked
    pub degraded: bool,
}

impl RateLimitResult {
    /// Whole seconds until reset, at least 1
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at_ms.saturating_sub(now_ms).div_ceil(1000).max(1)
    }

    /// Reset time as unix epoch seconds
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at_ms.div_ceil(1000)
    }
}

/// `user:<id>` when the caller is known, `ip:<addr>` otherwise
pub fn identity(ip: &str, user_id: Option<&str>) -> String {
    match user_id {
        Some(id) if !id.is_empty() => format!("user:{}", id),
        _ => format!("ip:{}", ip),
    }
}

/// Rate limiter over an injected counter store
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    timeout: Duration,
    auth_markers: Vec<String>,
    export_markers: Vec<String>,
    api: ScopeLimit,
    auth: ScopeLimit,
    export: ScopeLimit,
    admin: ScopeLimit,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &RateLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            key_prefix: config.key_prefix.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            auth_markers: config.auth_markers.clone(),
            export_markers: config.export_markers.clone(),
            api: config.api,
            auth: config.auth,
            export: config.export,
            admin: config.admin,
        }
    }

    pub fn limit_for(&self, scope: RateLimitScope) -> ScopeLimit {
        match scope {
            RateLimitScope::Api => self.api,
            RateLimitScope::Auth => self.auth,
            RateLimitScope::Export => self.export,
            RateLimitScope::Admin => self.admin,
        }
    }

    /// Pick the scope for a request path
    ///
    /// auth marker → `auth`, export marker → `export`, admin API → `admin`,
    /// anything else → `api`.
    pub fn scope_for(&self, path: &str, class: Option<RouteClass>) -> RateLimitScope {
        if self.auth_markers.iter().any(|m| path.contains(m.as_str())) {
            RateLimitScope::Auth
        } else if self.export_markers.iter().any(|m| path.contains(m.as_str())) {
            RateLimitScope::Export
        } else if class == Some(RouteClass::AdminApi) {
            RateLimitScope::Admin
        } else {
            RateLimitScope::Api
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Count one request for `identifier` in `scope`
    pub async fn check(&self, scope: RateLimitScope, identifier: &str) -> RateLimitResult {
        let limit = self.limit_for(scope);
        let window_ms = limit.window_secs.saturating_mul(1000).max(1);
        let now = self.clock.now_ms();
        let window_index = now / window_ms;
        let window_end = (window_index + 1) * window_ms;
        let key = format!(
            "{}:{}:{}:{}",
            self.key_prefix, scope, identifier, window_index
        );

        let outcome = tokio::time::timeout(
            self.timeout,
            self.store
                .increment(&key, Duration::from_millis(window_end - now)),
        )
        .await
        .unwrap_or_else(|_| {
            Err(StoreError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })
        });

        let state = match outcome {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    scope = %scope,
                    backend = self.store.backend(),
                    error = %e,
                    "Rate limit store unavailable, allowing request"
                );
                return self.fail_open(limit.limit, window_end);
            }
        };

        let success = state.count <= limit.limit;
        let result = RateLimitResult {
            success,
            remaining: limit.limit.saturating_sub(state.count),
            reset_at_ms: state.reset_at_ms,
            limit: limit.limit,
            degraded: false,
        };

        debug!(
            scope = %scope,
            identifier = %identifier,
            count = state.count,
            limit = limit.limit,
            success,
            "Rate limit checked"
        );

        result
    }

    fn fail_open(&self, limit: u64, reset_at_ms: u64) -> RateLimitResult {
        RateLimitResult {
            success: true,
            remaining: FAIL_OPEN_REMAINING,
            reset_at_ms,
            limit,
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::memory::MemoryCounterStore;
    use crate::rate_limit::store::ManualClock;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            &RateLimitConfig::default(),
            Arc::new(MemoryCounterStore::new()),
        )
    }

    #[test]
    fn test_identity() {
        assert_eq!(identity("10.0.0.1", None), "ip:10.0.0.1");
        assert_eq!(identity("10.0.0.1", Some("")), "ip:10.0.0.1");
        assert_eq!(identity("10.0.0.1", Some("u1")), "user:u1");
    }

    #[test]
    fn test_scope_selection() {
        let limiter = limiter();
        assert_eq!(
            limiter.scope_for("/api/auth/callback", Some(RouteClass::PublicApi)),
            RateLimitScope::Auth
        );
        assert_eq!(
            limiter.scope_for("/api/user/export/pdf", Some(RouteClass::ProtectedApi)),
            RateLimitScope::Export
        );
        assert_eq!(
            limiter.scope_for("/api/admin/stats", Some(RouteClass::AdminApi)),
            RateLimitScope::Admin
        );
        assert_eq!(
            limiter.scope_for("/api/progress", Some(RouteClass::ProtectedApi)),
            RateLimitScope::Api
        );
        assert_eq!(limiter.scope_for("/api/misc", None), RateLimitScope::Api);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let result = RateLimitResult {
            success: false,
            remaining: 0,
            reset_at_ms: 10_001,
            limit: 1,
            degraded: false,
        };
        assert_eq!(result.retry_after_secs(9_000), 2);
        assert_eq!(result.retry_after_secs(20_000), 1);
        assert_eq!(result.reset_at_secs(), 11);
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let limiter = limiter();

        let first = limiter.check(RateLimitScope::Export, "ip:1.1.1.1").await;
        assert!(first.success);
        assert_eq!(first.limit, 3);
        assert_eq!(first.remaining, 2);

        limiter.check(RateLimitScope::Export, "ip:1.1.1.1").await;
        let third = limiter.check(RateLimitScope::Export, "ip:1.1.1.1").await;
        assert!(third.success);
        assert_eq!(third.remaining, 0);

        let fourth = limiter.check(RateLimitScope::Export, "ip:1.1.1.1").await;
        assert!(!fourth.success);
        assert!(!fourth.degraded);
    }

    struct StalledStore;

    #[async_trait::async_trait]
    impl CounterStore for StalledStore {
        async fn increment(
            &self,
            _key: &str,
            _window: Duration,
        ) -> crate::error::StoreResult<crate::rate_limit::store::CounterState> {
            futures::future::pending().await
        }

        fn backend(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out_open() {
        let limiter = RateLimiter::new(&RateLimitConfig::default(), Arc::new(StalledStore));

        let result = limiter.check(RateLimitScope::Auth, "ip:1.1.1.1").await;
        assert!(result.success);
        assert!(result.degraded);
        assert_eq!(result.remaining, 1000);
    }

    #[tokio::test]
    async fn test_window_boundary_resets() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryCounterStore::with_clock(clock.clone()));
        let mut config = RateLimitConfig::default();
        config.api = ScopeLimit::new(1, 60);
        let limiter = RateLimiter::with_clock(&config, store, clock.clone());

        assert!(limiter.check(RateLimitScope::Api, "ip:a").await.success);
        let denied = limiter.check(RateLimitScope::Api, "ip:a").await;
        assert!(!denied.success);
        assert_eq!(denied.reset_at_ms, 60_000);

        clock.advance(Duration::from_secs(60));
        assert!(limiter.check(RateLimitScope::Api, "ip:a").await.success);
    }
}
