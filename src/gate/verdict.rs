//! Gate verdicts and decisions

use crate::rate_limit::RateLimitResult;
use crate::routing::RouteClass;
use axum::http::{HeaderName, StatusCode};
use serde::Serialize;
use std::fmt;

/// The one thing the gate does with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// Forward unchanged
    Allow,
    /// 307 to `location`; login redirects append the original URL
    Redirect {
        location: String,
        preserve_callback: bool,
    },
    /// Forward with the path replaced by `target`
    Rewrite { target: String },
    /// Terminal response produced by the gate
    Reject {
        status: StatusCode,
        /// Rendered as `{"error": ...}`; `None` means an empty body
        body: Option<String>,
        headers: Vec<(HeaderName, String)>,
    },
}

impl GateVerdict {
    pub fn redirect(location: impl Into<String>) -> Self {
        GateVerdict::Redirect {
            location: location.into(),
            preserve_callback: false,
        }
    }

    pub fn redirect_with_callback(location: impl Into<String>) -> Self {
        GateVerdict::Redirect {
            location: location.into(),
            preserve_callback: true,
        }
    }

    pub fn rewrite(target: impl Into<String>) -> Self {
        GateVerdict::Rewrite {
            target: target.into(),
        }
    }

    pub fn reject(status: StatusCode, message: impl Into<String>) -> Self {
        GateVerdict::Reject {
            status,
            body: Some(message.into()),
            headers: Vec::new(),
        }
    }

    /// Attach a header to a `Reject`; other verdicts are returned unchanged
    pub fn with_header(mut self, name: HeaderName, value: impl ToString) -> Self {
        if let GateVerdict::Reject { headers, .. } = &mut self {
            headers.push((name, value.to_string()));
        }
        self
    }

    pub fn kind(&self) -> VerdictKind {
        match self {
            GateVerdict::Allow => VerdictKind::Allow,
            GateVerdict::Redirect { .. } => VerdictKind::Redirect,
            GateVerdict::Rewrite { .. } => VerdictKind::Rewrite,
            GateVerdict::Reject { .. } => VerdictKind::Reject,
        }
    }

    /// Status the client will see, when the gate decides it
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GateVerdict::Redirect { .. } => Some(StatusCode::TEMPORARY_REDIRECT),
            GateVerdict::Reject { status, .. } => Some(*status),
            GateVerdict::Allow | GateVerdict::Rewrite { .. } => None,
        }
    }

    /// Forwarded upstream (possibly rewritten)
    pub fn forwards(&self) -> bool {
        matches!(self, GateVerdict::Allow | GateVerdict::Rewrite { .. })
    }

    /// Value of a `Reject` header
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        match self {
            GateVerdict::Reject { headers, .. } => headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Verdict discriminant (for metrics and logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Allow,
    Redirect,
    Rewrite,
    Reject,
}

impl VerdictKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Allow => "allow",
            VerdictKind::Redirect => "redirect",
            VerdictKind::Rewrite => "rewrite",
            VerdictKind::Reject => "reject",
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was not simply forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    MaintenanceActive,
    IpBlocked,
    QuotaExceeded,
    IdentityMissing,
    UserBanned,
    AuthorizationInsufficient,
}

impl DenyReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MaintenanceActive => "maintenance_active",
            DenyReason::IpBlocked => "ip_blocked",
            DenyReason::QuotaExceeded => "quota_exceeded",
            DenyReason::IdentityMissing => "identity_missing",
            DenyReason::UserBanned => "user_banned",
            DenyReason::AuthorizationInsufficient => "authorization_insufficient",
        }
    }

    /// Client-facing error message for API rejects
    pub const fn message(&self) -> &'static str {
        match self {
            DenyReason::MaintenanceActive => "Service temporarily unavailable",
            DenyReason::IpBlocked => "Access denied",
            DenyReason::QuotaExceeded => "Too many requests",
            DenyReason::IdentityMissing => "Authentication required",
            DenyReason::UserBanned => "User access revoked",
            DenyReason::AuthorizationInsufficient => "Admin access required",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource class used for caching headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Static,
    Api,
    Page,
}

impl ResourceClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Static => "static",
            ResourceClass::Api => "api",
            ResourceClass::Page => "page",
        }
    }
}

/// Degradations observed while deciding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionNotes {
    /// Access provider failed; flags treated as false
    pub access_degraded: bool,
    /// Counter store failed; request not counted
    pub rate_limit_degraded: bool,
    /// Pipeline failed; verdict came from the fallback strategy
    pub fallback: bool,
}

/// Verdict plus the context needed to render and record it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub verdict: GateVerdict,
    pub resource: ResourceClass,
    pub route: Option<RouteClass>,
    pub reason: Option<DenyReason>,
    pub rate_limit: Option<RateLimitResult>,
    pub notes: DecisionNotes,
}

impl GateDecision {
    pub fn new(verdict: GateVerdict, resource: ResourceClass, route: Option<RouteClass>) -> Self {
        Self {
            verdict,
            resource,
            route,
            reason: None,
            rate_limit: None,
            notes: DecisionNotes::default(),
        }
    }

    pub fn with_reason(mut self, reason: DenyReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_notes(mut self, notes: DecisionNotes) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_rate_limit(mut self, result: RateLimitResult) -> Self {
        self.rate_limit = Some(result);
        self
    }
}
