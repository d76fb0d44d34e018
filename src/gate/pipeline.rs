//! The gatekeeper pipeline
//!
//! One `Gatekeeper` is shared by every request. `evaluate` always returns a
//! decision: a run that panics is turned into a fallback verdict.
//!
//! API requests:
//!
//! ```text
//! OPTIONS → public API → access (ip) → rate limit → session → ban → RBAC → forward
//! ```
//!
//! Page requests:
//!
//! ```text
//! access (maintenance, ip) → ban → login with session → protected → admin → locale → forward
//! ```

use crate::access::{AccessCheck, AccessGate, AccessOutcome, AccessProvider};
use crate::config::{GateConfig, PageConfig};
use crate::error::{ConfigError, PipelineError};
use crate::gate::context::RequestContext;
use crate::gate::fallback::FallbackStrategy;
use crate::gate::verdict::{DecisionNotes, DenyReason, GateDecision, GateVerdict, ResourceClass};
use crate::rate_limit::{Clock, CounterStore, RateLimiter, SystemClock, identity};
use crate::rbac::{Role, RoleHierarchy};
use crate::routing::{BypassMatcher, LocaleResolver, Negotiation, RouteClass, RouteClassifier};
use crate::session::SessionProbe;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderName, Method, StatusCode};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Request gatekeeper
pub struct Gatekeeper {
    locales: Arc<LocaleResolver>,
    classifier: RouteClassifier,
    bypass: BypassMatcher,
    sessions: SessionProbe,
    roles: RoleHierarchy,
    admin_role: Role,
    limiter: RateLimiter,
    access: AccessGate,
    fallback: FallbackStrategy,
    pages: PageConfig,
    locale_cookie: String,
    maintenance_retry_after_secs: u64,
}

impl Gatekeeper {
    /// Build from configuration and the two remote collaborators
    pub fn new(
        config: &GateConfig,
        provider: Arc<dyn AccessProvider>,
        store: Arc<dyn CounterStore>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, provider, store, Arc::new(SystemClock))
    }

    /// Same as `new` with an explicit clock for the rate limiter
    pub fn with_clock(
        config: &GateConfig,
        provider: Arc<dyn AccessProvider>,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let admin_role = Role::try_parse(&config.roles.admin_role).ok_or_else(|| {
            ConfigError::Invalid {
                message: format!("roles.admin_role '{}' is not a role", config.roles.admin_role),
            }
        })?;

        Ok(Self {
            locales: Arc::new(LocaleResolver::from_config(&config.locales)),
            classifier: RouteClassifier::new(&config.routes),
            bypass: BypassMatcher::new(&config.bypass)?,
            sessions: SessionProbe::new(&config.session),
            roles: RoleHierarchy::from_config(&config.roles)?,
            admin_role,
            limiter: RateLimiter::with_clock(&config.rate_limits, store, clock),
            access: AccessGate::new(provider, Duration::from_millis(config.access.timeout_ms)),
            fallback: FallbackStrategy::new(&config.fallback),
            pages: config.pages.clone(),
            locale_cookie: config.locales.cookie.clone(),
            maintenance_retry_after_secs: config.access.maintenance_retry_after_secs,
        })
    }

    /// Replace the fallback strategy
    pub fn with_fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Shared locale resolver
    pub fn locales(&self) -> &Arc<LocaleResolver> {
        &self.locales
    }

    pub fn classifier(&self) -> &RouteClassifier {
        &self.classifier
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Whether the request carries a session token
    pub fn has_session(&self, ctx: &RequestContext) -> bool {
        self.sessions.probe(&ctx.cookies).present
    }

    pub fn resource_class(&self, ctx: &RequestContext) -> ResourceClass {
        if self.classifier.is_api_path(&ctx.stripped_path) {
            ResourceClass::Api
        } else if self.bypass.is_bypassed(&ctx.path) {
            ResourceClass::Static
        } else {
            ResourceClass::Page
        }
    }

    /// Decide what happens to a request. Never fails.
    pub async fn evaluate(&self, ctx: &RequestContext) -> GateDecision {
        let resource = self.resource_class(ctx);

        if resource == ResourceClass::Static {
            debug!(path = %ctx.path, "Bypassing gate for static path");
            return GateDecision::new(GateVerdict::Allow, ResourceClass::Static, None);
        }

        let route = self.classifier.classify(&ctx.stripped_path);

        let run = async {
            match resource {
                ResourceClass::Api => self.api_pipeline(ctx, route).await,
                _ => self.page_pipeline(ctx, route).await,
            }
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(decision) => {
                debug!(
                    method = %ctx.method,
                    path = %ctx.path,
                    route = ?route,
                    verdict = %decision.verdict.kind(),
                    reason = ?decision.reason,
                    "Gate decision"
                );
                decision
            }
            Err(panic) => {
                let cause = PipelineError::Panicked(panic_message(panic.as_ref()));
                self.fallback(ctx, resource, route, &cause.to_string())
            }
        }
    }

    /// Verdict for a request whose evaluation or rendering failed
    pub fn fallback(
        &self,
        ctx: &RequestContext,
        resource: ResourceClass,
        route: Option<RouteClass>,
        cause: &str,
    ) -> GateDecision {
        let policy = self.fallback.policy_for(resource, route, &ctx.method);

        error!(
            method = %ctx.method,
            path = %ctx.path,
            route = ?route,
            policy = ?policy,
            cause = %cause,
            "Gate pipeline failed, applying fallback"
        );

        GateDecision::new(self.fallback.verdict(policy), resource, route).with_notes(
            DecisionNotes {
                fallback: true,
                ..Default::default()
            },
        )
    }

    async fn api_pipeline(&self, ctx: &RequestContext, route: Option<RouteClass>) -> GateDecision {
        let decide = |verdict| GateDecision::new(verdict, ResourceClass::Api, route);
        let mut notes = DecisionNotes::default();

        // 1. Preflight
        if ctx.method == Method::OPTIONS {
            return decide(GateVerdict::Reject {
                status: StatusCode::OK,
                body: None,
                headers: Vec::new(),
            });
        }

        // 2. Public API
        if route == Some(RouteClass::PublicApi) {
            return decide(GateVerdict::Allow);
        }

        // 3. Maintenance and IP block
        let check = self.access.check(&ctx.client_ip, None).await;
        notes.access_degraded |= check.degraded;
        match check.outcome() {
            AccessOutcome::Maintenance => {
                return self.api_reject(route, DenyReason::MaintenanceActive, notes, |v| {
                    v.with_header(RETRY_AFTER, self.maintenance_retry_after_secs)
                });
            }
            AccessOutcome::IpBlocked => {
                return self.api_reject(route, DenyReason::IpBlocked, notes, |v| v);
            }
            // Bans are only meaningful with a user id (step 6)
            AccessOutcome::UserBanned | AccessOutcome::Allowed => {}
        }

        // 4. Rate limit
        let session = self.sessions.probe(&ctx.cookies);
        let scope = self.limiter.scope_for(&ctx.stripped_path, route);
        let identifier = identity(&ctx.client_ip, session.user_id.as_deref());
        let limit = self.limiter.check(scope, &identifier).await;
        notes.rate_limit_degraded |= limit.degraded;

        if !limit.success {
            let now = self.limiter.now_ms();
            return self
                .api_reject(route, DenyReason::QuotaExceeded, notes, |v| {
                    v.with_header(RETRY_AFTER, limit.retry_after_secs(now))
                        .with_header(X_RATELIMIT_LIMIT, limit.limit)
                        .with_header(X_RATELIMIT_REMAINING, limit.remaining)
                        .with_header(X_RATELIMIT_RESET, limit.reset_at_secs())
                })
                .with_rate_limit(limit);
        }

        // 5. Identity (fail-closed)
        if route.is_some_and(|r| r.requires_session()) && !session.present {
            return self
                .api_reject(route, DenyReason::IdentityMissing, notes, |v| v)
                .with_rate_limit(limit);
        }

        // 6. Ban
        if let Some(user_id) = session.user_id.as_deref() {
            let check = self.access.check(&ctx.client_ip, Some(user_id)).await;
            notes.access_degraded |= check.degraded;
            if check.decision.user_banned {
                return self
                    .api_reject(route, DenyReason::UserBanned, notes, |v| v)
                    .with_rate_limit(limit);
            }
        }

        // 7. Admin API
        if route == Some(RouteClass::AdminApi) && !self.roles.authorize(session.role, self.admin_role)
        {
            return self
                .api_reject(route, DenyReason::AuthorizationInsufficient, notes, |v| v)
                .with_rate_limit(limit);
        }

        // 8. Forward
        decide(GateVerdict::Allow)
            .with_notes(notes)
            .with_rate_limit(limit)
    }

    fn api_reject(
        &self,
        route: Option<RouteClass>,
        reason: DenyReason,
        notes: DecisionNotes,
        decorate: impl FnOnce(GateVerdict) -> GateVerdict,
    ) -> GateDecision {
        let status = match reason {
            DenyReason::MaintenanceActive => StatusCode::SERVICE_UNAVAILABLE,
            DenyReason::IpBlocked
            | DenyReason::UserBanned
            | DenyReason::AuthorizationInsufficient => StatusCode::FORBIDDEN,
            DenyReason::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            DenyReason::IdentityMissing => StatusCode::UNAUTHORIZED,
        };

        let verdict = decorate(GateVerdict::reject(status, reason.message()));

        GateDecision::new(verdict, ResourceClass::Api, route)
            .with_reason(reason)
            .with_notes(notes)
    }

    async fn page_pipeline(&self, ctx: &RequestContext, route: Option<RouteClass>) -> GateDecision {
        let session = self.sessions.probe(&ctx.cookies);
        let locale = ctx.locale.as_str();
        let mut notes = DecisionNotes::default();

        let decide = |verdict, reason: Option<DenyReason>, notes: DecisionNotes| {
            let decision = GateDecision::new(verdict, ResourceClass::Page, route).with_notes(notes);
            match reason {
                Some(reason) => decision.with_reason(reason),
                None => decision,
            }
        };

        // 1-2. Maintenance, IP block, ban
        let check: AccessCheck = self
            .access
            .check(&ctx.client_ip, session.user_id.as_deref())
            .await;
        notes.access_degraded |= check.degraded;

        match check.outcome() {
            AccessOutcome::Maintenance => {
                return decide(
                    GateVerdict::rewrite(self.locales.localize(locale, &self.pages.maintenance)),
                    Some(DenyReason::MaintenanceActive),
                    notes,
                );
            }
            AccessOutcome::IpBlocked => {
                return decide(
                    GateVerdict::reject(StatusCode::FORBIDDEN, DenyReason::IpBlocked.message()),
                    Some(DenyReason::IpBlocked),
                    notes,
                );
            }
            AccessOutcome::UserBanned => {
                return decide(
                    GateVerdict::redirect(self.locales.localize(locale, &self.pages.banned)),
                    Some(DenyReason::UserBanned),
                    notes,
                );
            }
            AccessOutcome::Allowed => {}
        }

        // 3. Authenticated users skip the login page
        if ctx.stripped_path == self.pages.login && session.present {
            return decide(
                GateVerdict::redirect(self.locales.localize(locale, &self.pages.after_login)),
                None,
                notes,
            );
        }

        // 4. Protected pages need a session
        if route == Some(RouteClass::Protected) && !session.present {
            return decide(
                self.login_redirect(locale),
                Some(DenyReason::IdentityMissing),
                notes,
            );
        }

        // 5. Admin pages need the admin role
        if route == Some(RouteClass::Admin) && !self.roles.authorize(session.role, self.admin_role) {
            return if session.present {
                decide(
                    GateVerdict::redirect(
                        self.locales
                            .localize(locale, &self.pages.default_authenticated),
                    ),
                    Some(DenyReason::AuthorizationInsufficient),
                    notes,
                )
            } else {
                decide(
                    self.login_redirect(locale),
                    Some(DenyReason::IdentityMissing),
                    notes,
                )
            };
        }

        // 6. Locale negotiation
        let verdict = self.negotiate(ctx);
        decide(verdict, None, notes)
    }

    fn login_redirect(&self, locale: &str) -> GateVerdict {
        GateVerdict::redirect_with_callback(self.locales.localize(locale, &self.pages.login))
    }

    fn negotiate(&self, ctx: &RequestContext) -> GateVerdict {
        match self.locales.negotiate(
            &ctx.path,
            ctx.query.as_deref(),
            ctx.cookies.non_empty(&self.locale_cookie),
            ctx.header("accept-language"),
        ) {
            Negotiation::Forward => GateVerdict::Allow,
            Negotiation::Redirect(location) => GateVerdict::redirect(location),
            Negotiation::Rewrite(target) => GateVerdict::rewrite(target),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::StaticAccessProvider;
    use crate::rate_limit::MemoryCounterStore;

    fn gatekeeper() -> Gatekeeper {
        Gatekeeper::new(
            &GateConfig::default(),
            Arc::new(StaticAccessProvider::open()),
            Arc::new(MemoryCounterStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_resource_class() {
        let gate = gatekeeper();
        let locales = gate.locales().clone();

        let ctx = RequestContext::builder(Method::GET, "/_next/static/app.js").build(&locales);
        assert_eq!(gate.resource_class(&ctx), ResourceClass::Static);

        let ctx = RequestContext::builder(Method::GET, "/api/logo.png").build(&locales);
        assert_eq!(gate.resource_class(&ctx), ResourceClass::Api);

        let ctx = RequestContext::builder(Method::GET, "/ru/modules").build(&locales);
        assert_eq!(gate.resource_class(&ctx), ResourceClass::Page);
    }

    #[tokio::test]
    async fn test_options_short_circuits() {
        let gate = gatekeeper();
        let ctx = RequestContext::builder(Method::OPTIONS, "/api/admin/stats")
            .build(gate.locales());

        let decision = gate.evaluate(&ctx).await;
        assert_eq!(decision.verdict.status(), Some(StatusCode::OK));
        assert!(decision.rate_limit.is_none());
    }

    #[tokio::test]
    async fn test_public_page_gets_locale_redirect() {
        let gate = gatekeeper();
        let ctx = RequestContext::builder(Method::GET, "/modules").build(gate.locales());

        let decision = gate.evaluate(&ctx).await;
        assert_eq!(decision.verdict, GateVerdict::redirect("/en/modules"));
        assert_eq!(decision.route, Some(RouteClass::Public));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
