//! Distributed rate limiting
//!
//! A `RateLimiter` counts requests per scope and identity through a
//! `CounterStore`. Redis is the shared store; the in-memory store is a
//! single-instance fallback.
//!
//! ## Example Configuration
//!
//! ```toml
//! [rate_limits]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"   # or REDIS_URL
//!
//! [rate_limits.auth]
//! limit = 20
//! window_secs = 300
//! ```

pub mod limiter;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use limiter::{FAIL_OPEN_REMAINING, RateLimitResult, RateLimitScope, RateLimiter, identity};
pub use memory::MemoryCounterStore;
pub use redis_store::RedisCounterStore;
pub use store::{Clock, CounterState, CounterStore, ManualClock, SystemClock};

use crate::config::{CounterBackend, RateLimitConfig};
use std::sync::Arc;
use tracing::warn;

/// Build the configured counter store, falling back to memory when Redis is
/// unreachable at startup
pub async fn build_store(config: &RateLimitConfig) -> Arc<dyn CounterStore> {
    match config.backend {
        CounterBackend::Memory => Arc::new(MemoryCounterStore::new()),
        CounterBackend::Redis => {
            let timeout = std::time::Duration::from_millis(config.timeout_ms.max(1000));
            match tokio::time::timeout(timeout, RedisCounterStore::connect(&config.redis_url))
                .await
            {
                Ok(Ok(store)) => Arc::new(store),
                Ok(Err(e)) => {
                    warn!(error = %e, "Redis unavailable, using in-memory rate limit counters");
                    Arc::new(MemoryCounterStore::new())
                }
                Err(_) => {
                    warn!("Redis connect timed out, using in-memory rate limit counters");
                    Arc::new(MemoryCounterStore::new())
                }
            }
        }
    }
}
