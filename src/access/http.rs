//! Remote access document provider
//!
//! Fetches a JSON document of security flags from an HTTP endpoint and
//! caches it for a short TTL. Only the `security` and `maintenance`
//! sections are read; anything else in the document is ignored.
//!
//! ```json
//! {
//!   "security": {
//!     "blockedIPs": ["203.0.113.7"],
//!     "bannedUsers": ["user-42"],
//!     "maintenanceMode": false,
//!     "emergencyLockdown": false
//!   },
//!   "maintenance": {
//!     "isScheduled": true,
//!     "startTime": "2026-03-01T02:00:00Z",
//!     "endTime": "2026-03-01T04:00:00Z"
//!   }
//! }
//! ```

use crate::access::provider::{AccessDecision, AccessProvider};
use crate::config::AccessConfig;
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

/// Security section of the access document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityFlags {
    #[serde(rename = "blockedIPs")]
    pub blocked_ips: Vec<String>,
    pub banned_users: Vec<String>,
    pub maintenance_mode: bool,
    pub emergency_lockdown: bool,
}

/// Scheduled maintenance window
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaintenanceWindow {
    pub is_scheduled: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl MaintenanceWindow {
    /// Scheduled and `start <= now <= end`. A window missing either bound is
    /// never active.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match (self.is_scheduled, self.start_time, self.end_time) {
            (true, Some(start), Some(end)) => start <= now && now <= end,
            _ => false,
        }
    }
}

/// The remote access document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccessDocument {
    pub security: SecurityFlags,
    pub maintenance: MaintenanceWindow,
}

impl AccessDocument {
    /// Evaluate flags for a caller at `now`
    pub fn evaluate(&self, ip: &str, user_id: Option<&str>, now: DateTime<Utc>) -> AccessDecision {
        let security = &self.security;

        AccessDecision {
            maintenance_active: security.emergency_lockdown
                || security.maintenance_mode
                || self.maintenance.is_active_at(now),
            ip_blocked: security.blocked_ips.iter().any(|blocked| blocked == ip),
            user_banned: user_id
                .is_some_and(|id| security.banned_users.iter().any(|banned| banned == id)),
        }
    }
}

struct CachedDocument {
    document: Arc<AccessDocument>,
    fetched_at: Instant,
}

/// Provider backed by a remote JSON document
pub struct HttpAccessProvider {
    http: Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedDocument>>,
    /// Held while fetching so an expired document is refreshed once
    refresh: Mutex<()>,
}

impl HttpAccessProvider {
    pub fn new(config: &AccessConfig) -> ProviderResult<Self> {
        let url = config
            .http
            .url
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("access.http.url is not set".to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(format!("dojo-gatekeeper/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProviderError::Request)?;

        Ok(Self {
            http,
            url,
            token: config.http.token.clone(),
            timeout,
            cache_ttl: Duration::from_secs(config.http.cache_ttl_secs),
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        })
    }

    /// Current document, fetched when the cached copy is older than the TTL
    ///
    /// Concurrent callers that find the copy expired wait for a single fetch.
    pub async fn document(&self) -> ProviderResult<Arc<AccessDocument>> {
        if let Some(document) = self.fresh().await {
            return Ok(document);
        }

        let requested_at = Instant::now();
        let _refresh = self.refresh.lock().await;

        // Another caller may have refreshed while this one waited
        if let Some(document) = self.fresh_since(requested_at).await {
            return Ok(document);
        }

        let document = Arc::new(self.fetch().await?);

        let mut cache = self.cache.write().await;
        *cache = Some(CachedDocument {
            document: document.clone(),
            fetched_at: Instant::now(),
        });

        Ok(document)
    }

    async fn fresh(&self) -> Option<Arc<AccessDocument>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.cache_ttl)
            .map(|cached| cached.document.clone())
    }

    /// Fresh copy, or one fetched after `requested_at`
    async fn fresh_since(&self, requested_at: Instant) -> Option<Arc<AccessDocument>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| {
                cached.fetched_at.elapsed() < self.cache_ttl || cached.fetched_at > requested_at
            })
            .map(|cached| cached.document.clone())
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> ProviderResult<AccessDocument> {
        let mut request = self.http.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                ProviderError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Access document request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let document: AccessDocument = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidDocument(e.to_string()))?;

        debug!(
            blocked_ips = document.security.blocked_ips.len(),
            banned_users = document.security.banned_users.len(),
            "Fetched access document"
        );

        Ok(document)
    }
}

#[async_trait]
impl AccessProvider for HttpAccessProvider {
    async fn check_access(
        &self,
        ip: &str,
        user_id: Option<&str>,
    ) -> ProviderResult<AccessDecision> {
        let document = self.document().await?;
        Ok(document.evaluate(ip, user_id, Utc::now()))
    }

    fn provider_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document(json: &str) -> AccessDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_partial_document() {
        let doc = document(r#"{"security": {"blockedIPs": ["1.2.3.4"]}, "features": {}}"#);
        assert_eq!(doc.security.blocked_ips, vec!["1.2.3.4"]);
        assert!(!doc.security.maintenance_mode);
        assert!(!doc.maintenance.is_scheduled);
    }

    #[test]
    fn test_evaluate_flags() {
        let doc = document(
            r#"{"security": {"blockedIPs": ["1.2.3.4"], "bannedUsers": ["u-1"]}}"#,
        );
        let now = Utc::now();

        let decision = doc.evaluate("1.2.3.4", Some("u-2"), now);
        assert!(decision.ip_blocked);
        assert!(!decision.user_banned);

        let decision = doc.evaluate("5.6.7.8", Some("u-1"), now);
        assert!(decision.user_banned);
        assert!(!decision.maintenance_active);
    }

    #[test]
    fn test_emergency_lockdown_is_maintenance() {
        let doc = document(r#"{"security": {"emergencyLockdown": true}}"#);
        assert!(doc.evaluate("1.1.1.1", None, Utc::now()).maintenance_active);
    }

    #[test]
    fn test_scheduled_window() {
        let doc = document(
            r#"{"maintenance": {
                "isScheduled": true,
                "startTime": "2026-03-01T02:00:00Z",
                "endTime": "2026-03-01T04:00:00Z"
            }}"#,
        );

        let inside = Utc.with_ymd_and_hms(2026, 3, 1, 3, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 3, 1, 1, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 4, 0, 1).unwrap();

        assert!(doc.evaluate("1.1.1.1", None, inside).maintenance_active);
        assert!(!doc.evaluate("1.1.1.1", None, before).maintenance_active);
        assert!(!doc.evaluate("1.1.1.1", None, after).maintenance_active);
    }

    #[test]
    fn test_unscheduled_window_is_inactive() {
        let window = MaintenanceWindow {
            is_scheduled: false,
            start_time: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            end_time: Some(Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()),
        };
        assert!(!window.is_active_at(Utc::now()));
    }
}
