//! Gate metrics collection
//!
//! Thread-safe counters for verdicts, statuses, route classes and
//! degradations, plus a ring buffer of recent decisions. Metrics never
//! influence a verdict.

use crate::gate::{GateDecision, RequestContext, VerdictKind};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

/// Gate metrics collector
pub struct GateMetrics {
    /// Process start
    start_time: Instant,
    /// Process start as SystemTime (for display)
    start_system_time: SystemTime,
    total_requests: AtomicU64,
    access_degraded: AtomicU64,
    rate_limit_degraded: AtomicU64,
    fallbacks: AtomicU64,
    /// Keyed counters behind a single lock
    data: RwLock<MetricsData>,
    max_recent: usize,
}

#[derive(Default)]
struct MetricsData {
    verdicts: HashMap<VerdictKind, u64>,
    statuses: HashMap<u16, u64>,
    routes: HashMap<String, u64>,
    reasons: HashMap<String, u64>,
    recent: VecDeque<DecisionRecord>,
}

/// One recent decision
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub method: String,
    pub path: String,
    pub verdict: VerdictKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub degraded: bool,
    pub fallback: bool,
    pub duration_us: u64,
    pub timestamp: u64,
}

/// Named counter for the snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Count {
    pub name: String,
    pub count: u64,
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub start_time: u64,
    pub total_requests: u64,
    pub requests_per_minute: f64,
    pub access_degraded: u64,
    pub rate_limit_degraded: u64,
    pub fallbacks: u64,
    pub verdicts: Vec<Count>,
    pub statuses: Vec<Count>,
    pub routes: Vec<Count>,
    pub reasons: Vec<Count>,
    pub recent: Vec<DecisionRecord>,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Keep at most `max_recent` recent decisions
    pub fn with_capacity(max_recent: usize) -> Self {
        Self {
            start_time: Instant::now(),
            start_system_time: SystemTime::now(),
            total_requests: AtomicU64::new(0),
            access_degraded: AtomicU64::new(0),
            rate_limit_degraded: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            data: RwLock::new(MetricsData {
                recent: VecDeque::with_capacity(max_recent),
                ..Default::default()
            }),
            max_recent,
        }
    }

    // Poisoned locks are recovered; metrics are best effort

    fn write_data(&self) -> RwLockWriteGuard<'_, MetricsData> {
        self.data.write().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_data(&self) -> RwLockReadGuard<'_, MetricsData> {
        self.data.read().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record a decision and the status finally sent to the client
    pub fn record(
        &self,
        ctx: &RequestContext,
        decision: &GateDecision,
        status: Option<u16>,
        duration: Duration,
    ) {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if decision.notes.access_degraded {
            self.access_degraded.fetch_add(1, Ordering::Relaxed);
        }
        if decision.notes.rate_limit_degraded {
            self.rate_limit_degraded.fetch_add(1, Ordering::Relaxed);
        }
        if decision.notes.fallback {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }

        let kind = decision.verdict.kind();
        let route = decision
            .route
            .map(|r| r.as_str())
            .unwrap_or(decision.resource.as_str());

        let mut data = self.write_data();

        *data.verdicts.entry(kind).or_default() += 1;
        if let Some(status) = status {
            *data.statuses.entry(status).or_default() += 1;
        }
        if let Some(count) = data.routes.get_mut(route) {
            *count += 1;
        } else {
            data.routes.insert(route.to_string(), 1);
        }
        if let Some(reason) = decision.reason {
            *data.reasons.entry(reason.as_str().to_string()).or_default() += 1;
        }

        if self.max_recent == 0 {
            return;
        }
        if data.recent.len() >= self.max_recent {
            data.recent.pop_front();
        }
        data.recent.push_back(DecisionRecord {
            method: ctx.method.to_string(),
            path: ctx.path.clone(),
            verdict: kind,
            status,
            route: decision.route.map(|r| r.as_str().to_string()),
            reason: decision.reason.map(|r| r.as_str().to_string()),
            degraded: decision.notes.access_degraded || decision.notes.rate_limit_degraded,
            fallback: decision.notes.fallback,
            duration_us: duration.as_micros() as u64,
            timestamp,
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime_secs = self.start_time.elapsed().as_secs();
        let total_requests = self.total_requests.load(Ordering::Relaxed);

        let requests_per_minute = if uptime_secs > 0 {
            (total_requests as f64 / uptime_secs as f64) * 60.0
        } else {
            0.0
        };

        let data = self.read_data();

        let verdicts = sorted(data.verdicts.iter().map(|(k, v)| (k.as_str().to_string(), *v)));
        let statuses = sorted(data.statuses.iter().map(|(k, v)| (k.to_string(), *v)));
        let routes = sorted(data.routes.iter().map(|(k, v)| (k.clone(), *v)));
        let reasons = sorted(data.reasons.iter().map(|(k, v)| (k.clone(), *v)));
        let recent: Vec<_> = data.recent.iter().cloned().collect();

        drop(data);

        let start_time = self
            .start_system_time
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        MetricsSnapshot {
            uptime_secs,
            start_time,
            total_requests,
            requests_per_minute,
            access_degraded: self.access_degraded.load(Ordering::Relaxed),
            rate_limit_degraded: self.rate_limit_degraded.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            verdicts,
            statuses,
            routes,
            reasons,
            recent,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest count first, then by name
fn sorted(items: impl Iterator<Item = (String, u64)>) -> Vec<Count> {
    let mut counts: Vec<Count> = items.map(|(name, count)| Count { name, count }).collect();
    counts.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{DecisionNotes, DenyReason, GateVerdict, ResourceClass};
    use crate::routing::{LocaleResolver, RouteClass};
    use axum::http::{Method, StatusCode};

    fn ctx(path: &str) -> RequestContext {
        RequestContext::builder(Method::GET, path).build(&LocaleResolver::default())
    }

    #[test]
    fn test_metrics_new() {
        let metrics = GateMetrics::new();
        assert_eq!(metrics.total_requests(), 0);
        assert!(metrics.snapshot().recent.is_empty());
    }

    #[test]
    fn test_record_counts() {
        let metrics = GateMetrics::new();

        let allow = GateDecision::new(GateVerdict::Allow, ResourceClass::Page, Some(RouteClass::Public));
        metrics.record(&ctx("/en"), &allow, Some(200), Duration::from_micros(50));

        let reject = GateDecision::new(
            GateVerdict::reject(StatusCode::UNAUTHORIZED, "Authentication required"),
            ResourceClass::Api,
            Some(RouteClass::AdminApi),
        )
        .with_reason(DenyReason::IdentityMissing)
        .with_notes(DecisionNotes {
            access_degraded: true,
            ..Default::default()
        });
        metrics.record(&ctx("/api/admin/x"), &reject, Some(401), Duration::from_micros(80));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.access_degraded, 1);
        assert_eq!(snapshot.fallbacks, 0);
        assert!(snapshot.statuses.iter().any(|c| c.name == "401" && c.count == 1));
        assert!(snapshot.reasons.iter().any(|c| c.name == "identity_missing"));
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.recent[1].route.as_deref(), Some("admin_api"));
    }

    #[test]
    fn test_recent_is_bounded() {
        let metrics = GateMetrics::with_capacity(3);
        let decision = GateDecision::new(GateVerdict::Allow, ResourceClass::Static, None);

        for i in 0..5 {
            metrics.record(&ctx(&format!("/img/{}.png", i)), &decision, None, Duration::ZERO);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert_eq!(snapshot.recent[0].path, "/img/2.png");
        assert!(snapshot.routes.iter().any(|c| c.name == "static" && c.count == 5));
    }
}
