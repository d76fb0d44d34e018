//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dojo_gatekeeper::access::{AccessDecision, AccessProvider};
use dojo_gatekeeper::config::{CounterBackend, GateConfig, ScopeLimit};
use dojo_gatekeeper::error::{ProviderError, ProviderResult, StoreError, StoreResult};
use dojo_gatekeeper::gate::{Gatekeeper, RequestContext, RequestContextBuilder};
use dojo_gatekeeper::rate_limit::{
    Clock, CounterState, CounterStore, ManualClock, MemoryCounterStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 2026-01-01T00:00:00Z, aligned to every window used in tests
pub const EPOCH_MS: u64 = 1_767_225_600_000;

/// Access provider with fixed flags that counts its calls
#[derive(Default)]
pub struct FakeAccessProvider {
    pub maintenance: bool,
    pub blocked_ips: HashSet<String>,
    pub banned_users: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeAccessProvider {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn maintenance() -> Self {
        Self {
            maintenance: true,
            ..Default::default()
        }
    }

    pub fn blocking_ip(ip: &str) -> Self {
        Self {
            blocked_ips: HashSet::from([ip.to_string()]),
            ..Default::default()
        }
    }

    pub fn banning(user_id: &str) -> Self {
        Self {
            banned_users: HashSet::from([user_id.to_string()]),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessProvider for FakeAccessProvider {
    async fn check_access(
        &self,
        ip: &str,
        user_id: Option<&str>,
    ) -> ProviderResult<AccessDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessDecision {
            maintenance_active: self.maintenance,
            ip_blocked: self.blocked_ips.contains(ip),
            user_banned: user_id.is_some_and(|id| self.banned_users.contains(id)),
        })
    }

    fn provider_type(&self) -> &'static str {
        "fake"
    }
}

/// Provider that is always unreachable
#[derive(Default)]
pub struct FailingAccessProvider {
    calls: AtomicUsize,
}

impl FailingAccessProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessProvider for FailingAccessProvider {
    async fn check_access(&self, _ip: &str, _user_id: Option<&str>) -> ProviderResult<AccessDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Unavailable("connection refused".to_string()))
    }

    fn provider_type(&self) -> &'static str {
        "failing"
    }
}

/// Provider whose evaluation panics
pub struct PanickingAccessProvider;

#[async_trait]
impl AccessProvider for PanickingAccessProvider {
    async fn check_access(&self, _ip: &str, _user_id: Option<&str>) -> ProviderResult<AccessDecision> {
        panic!("access document corrupted");
    }

    fn provider_type(&self) -> &'static str {
        "panicking"
    }
}

/// Counter store wrapper that counts increments
pub struct CountingStore {
    inner: MemoryCounterStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryCounterStore::with_clock(clock),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterStore for CountingStore {
    async fn increment(&self, key: &str, window: Duration) -> StoreResult<CounterState> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.increment(key, window).await
    }

    fn backend(&self) -> &'static str {
        "counting"
    }
}

/// Counter store that is always unreachable
pub struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn increment(&self, _key: &str, _window: Duration) -> StoreResult<CounterState> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

/// Default configuration with in-memory counters
pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.rate_limits.backend = CounterBackend::Memory;
    config
}

/// Configuration with the `auth` scope limited to 20 per 5 minutes
pub fn auth_limited_config() -> GateConfig {
    let mut config = test_config();
    config.rate_limits.auth = ScopeLimit::new(20, 300);
    config
}

/// Gatekeeper wired to the given fakes
pub struct Harness<P> {
    pub gate: Gatekeeper,
    pub provider: Arc<P>,
    pub store: Arc<CountingStore>,
    pub clock: Arc<ManualClock>,
}

impl<P: AccessProvider + 'static> Harness<P> {
    pub fn new(config: &GateConfig, provider: P) -> Self {
        let provider = Arc::new(provider);
        let clock = Arc::new(ManualClock::new(EPOCH_MS));
        let store = Arc::new(CountingStore::new(clock.clone()));
        let gate = Gatekeeper::with_clock(config, provider.clone(), store.clone(), clock.clone())
            .expect("gatekeeper");

        Self {
            gate,
            provider,
            store,
            clock,
        }
    }

    pub fn request(&self, builder: RequestContextBuilder) -> RequestContext {
        builder.build(self.gate.locales())
    }
}
