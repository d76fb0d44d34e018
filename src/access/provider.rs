//! Access provider trait
//!
//! Providers answer three questions about a caller: is the platform in
//! maintenance, is this IP blocked, is this user banned. They must report
//! unreachability as an error, never as an all-clear.

use crate::config::StaticAccessConfig;
use crate::error::ProviderResult;
// async_trait required for dyn-compatibility with Arc<dyn AccessProvider>
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;

/// Access flags for one caller at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub maintenance_active: bool,
    pub ip_blocked: bool,
    pub user_banned: bool,
}

impl AccessDecision {
    pub fn allowed() -> Self {
        Self::default()
    }

    pub fn is_allowed(&self) -> bool {
        !self.maintenance_active && !self.ip_blocked && !self.user_banned
    }
}

/// Access-control provider
#[async_trait]
pub trait AccessProvider: Send + Sync {
    /// Evaluate access for `ip` and, when known, `user_id`
    async fn check_access(&self, ip: &str, user_id: Option<&str>)
    -> ProviderResult<AccessDecision>;

    /// Provider name (for logging)
    fn provider_type(&self) -> &'static str;
}

/// Provider backed by fixed configuration
#[derive(Debug, Clone, Default)]
pub struct StaticAccessProvider {
    maintenance: bool,
    blocked_ips: HashSet<String>,
    banned_users: HashSet<String>,
}

impl StaticAccessProvider {
    pub fn new(config: &StaticAccessConfig) -> Self {
        Self {
            maintenance: config.maintenance,
            blocked_ips: config.blocked_ips.iter().cloned().collect(),
            banned_users: config.banned_users.iter().cloned().collect(),
        }
    }

    /// Provider that allows everything
    pub fn open() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessProvider for StaticAccessProvider {
    async fn check_access(
        &self,
        ip: &str,
        user_id: Option<&str>,
    ) -> ProviderResult<AccessDecision> {
        Ok(AccessDecision {
            maintenance_active: self.maintenance,
            ip_blocked: self.blocked_ips.contains(ip),
            user_banned: user_id.is_some_and(|id| self.banned_users.contains(id)),
        })
    }

    fn provider_type(&self) -> &'static str {
        "static"
    }
}
