//! Process-local counter store
//!
//! Used when no Redis is configured or reachable. Counters are not shared
//! between gate instances, so limits are per instance.

use crate::error::StoreResult;
use crate::rate_limit::store::{Clock, CounterState, CounterStore, SystemClock};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Prune expired buckets once the map grows past this many entries
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u64,
    expires_at_ms: u64,
}

/// In-memory counters with TTL
pub struct MemoryCounterStore {
    buckets: Mutex<HashMap<String, Bucket>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of buckets currently held (expired ones included until pruned)
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("counter store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> StoreResult<CounterState> {
        let now = self.clock.now_ms();
        let window_ms = window.as_millis() as u64;
        let mut buckets = self.lock();

        if buckets.len() >= PRUNE_THRESHOLD {
            buckets.retain(|_, bucket| bucket.expires_at_ms > now);
        }

        let bucket = match buckets.get_mut(key) {
            Some(bucket) if bucket.expires_at_ms > now => {
                bucket.count += 1;
                *bucket
            }
            _ => {
                let bucket = Bucket {
                    count: 1,
                    expires_at_ms: now + window_ms,
                };
                buckets.insert(key.to_string(), bucket);
                bucket
            }
        };

        Ok(CounterState {
            count: bucket.count,
            reset_at_ms: bucket.expires_at_ms,
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::store::ManualClock;

    #[tokio::test]
    async fn test_increment_counts_up() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);

        assert_eq!(store.increment("k", window).await.unwrap().count, 1);
        assert_eq!(store.increment("k", window).await.unwrap().count, 2);
        assert_eq!(store.increment("other", window).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_bucket_expires() {
        let clock = Arc::new(ManualClock::new(5_000));
        let store = MemoryCounterStore::with_clock(clock.clone());
        let window = Duration::from_secs(10);

        let first = store.increment("k", window).await.unwrap();
        assert_eq!(first.reset_at_ms, 15_000);

        store.increment("k", window).await.unwrap();
        clock.advance(Duration::from_secs(10));

        let after = store.increment("k", window).await.unwrap();
        assert_eq!(after.count, 1);
        assert_eq!(after.reset_at_ms, 25_000);
    }
}
