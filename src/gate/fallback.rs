//! Fallback strategy for failed pipeline runs
//!
//! Pages fail open, mutating API requests fail closed, read-only API
//! requests fail open. Per route class overrides take precedence.

use crate::config::{FailurePolicy, FallbackConfig};
use crate::gate::verdict::{GateVerdict, ResourceClass};
use crate::routing::RouteClass;
use axum::http::{Method, StatusCode};
use std::collections::HashMap;

/// Chooses the verdict when a pipeline run fails
#[derive(Debug, Clone)]
pub struct FallbackStrategy {
    pages: FailurePolicy,
    api_read: FailurePolicy,
    api_mutating: FailurePolicy,
    overrides: HashMap<RouteClass, FailurePolicy>,
}

impl FallbackStrategy {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            pages: config.pages,
            api_read: config.api_read,
            api_mutating: config.api_mutating,
            overrides: config
                .overrides
                .iter()
                .filter_map(|(class, policy)| RouteClass::try_parse(class).map(|c| (c, *policy)))
                .collect(),
        }
    }

    pub fn with_override(mut self, class: RouteClass, policy: FailurePolicy) -> Self {
        self.overrides.insert(class, policy);
        self
    }

    /// Policy for a request
    pub fn policy_for(
        &self,
        resource: ResourceClass,
        route: Option<RouteClass>,
        method: &Method,
    ) -> FailurePolicy {
        if let Some(policy) = route.and_then(|class| self.overrides.get(&class)) {
            return *policy;
        }

        match resource {
            ResourceClass::Api if is_mutating(method) => self.api_mutating,
            ResourceClass::Api => self.api_read,
            ResourceClass::Page | ResourceClass::Static => self.pages,
        }
    }

    /// Verdict for a policy
    pub fn verdict(&self, policy: FailurePolicy) -> GateVerdict {
        match policy {
            FailurePolicy::Open => GateVerdict::Allow,
            FailurePolicy::Closed => {
                GateVerdict::reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl Default for FallbackStrategy {
    fn default() -> Self {
        Self::new(&FallbackConfig::default())
    }
}

/// POST, PUT, PATCH, DELETE
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
