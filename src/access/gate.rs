//! Fail-open access gate
//!
//! Wraps an `AccessProvider` with a timeout. When the provider errors or
//! times out the request proceeds as if every flag were false, and the
//! result is marked degraded so callers can tell it apart from a real
//! all-clear.

use crate::access::provider::{AccessDecision, AccessProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Decision plus whether it is a fail-open substitute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessCheck {
    pub decision: AccessDecision,
    pub degraded: bool,
}

/// What the gate should do, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Maintenance,
    IpBlocked,
    UserBanned,
    Allowed,
}

impl AccessCheck {
    /// maintenance → IP block → ban
    pub fn outcome(&self) -> AccessOutcome {
        let d = &self.decision;
        if d.maintenance_active {
            AccessOutcome::Maintenance
        } else if d.ip_blocked {
            AccessOutcome::IpBlocked
        } else if d.user_banned {
            AccessOutcome::UserBanned
        } else {
            AccessOutcome::Allowed
        }
    }
}

/// Timeout-bounded access checks
#[derive(Clone)]
pub struct AccessGate {
    provider: Arc<dyn AccessProvider>,
    timeout: Duration,
}

impl AccessGate {
    pub fn new(provider: Arc<dyn AccessProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_type(&self) -> &'static str {
        self.provider.provider_type()
    }

    /// Check `ip` and optionally `user_id`. Never fails.
    pub async fn check(&self, ip: &str, user_id: Option<&str>) -> AccessCheck {
        match tokio::time::timeout(self.timeout, self.provider.check_access(ip, user_id)).await {
            Ok(Ok(decision)) => AccessCheck {
                decision,
                degraded: false,
            },
            Ok(Err(e)) => {
                warn!(
                    provider = self.provider.provider_type(),
                    error = %e,
                    "Access check failed, allowing request"
                );
                AccessCheck {
                    decision: AccessDecision::allowed(),
                    degraded: true,
                }
            }
            Err(_) => {
                warn!(
                    provider = self.provider.provider_type(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Access check timed out, allowing request"
                );
                AccessCheck {
                    decision: AccessDecision::allowed(),
                    degraded: true,
                }
            }
        }
    }
}
