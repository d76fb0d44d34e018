//! Counter store abstraction
//!
//! Atomicity lives in the store: `increment` must return the post-increment
//! count even under concurrent callers, and the bucket must expire on its own
//! after the window.

use crate::error::StoreResult;
// async_trait required for dyn-compatibility with Arc<dyn CounterStore>
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Counter value after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    /// Count including this increment
    pub count: u64,
    /// When the bucket expires (unix epoch, milliseconds)
    pub reset_at_ms: u64,
}

/// Atomic counter with TTL
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, starting a `window`-long TTL on the first increment
    async fn increment(&self, key: &str, window: Duration) -> StoreResult<CounterState>;

    /// Backend name (for logging)
    fn backend(&self) -> &'static str;
}

/// Source of the current time in unix milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
