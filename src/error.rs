//! Error types for dojo-gatekeeper
//!
//! This module defines the error hierarchy used throughout the gatekeeper.
//! Collaborator failures (`ProviderError`, `StoreError`) never reach the
//! client: the components that call them absorb them fail-open. Only
//! configuration and transport errors surface to the binary.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Access provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid role hierarchy: {0}")]
    RoleHierarchy(String),
}

/// Failures of the remote access-control provider.
///
/// Unreachability is always reported as an error, never as an
/// all-false decision.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Access provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Access provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("Invalid access document: {0}")]
    InvalidDocument(String),

    #[error("Access provider timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Access provider unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the rate-limit counter store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Counter store timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while evaluating a request; handled by the fallback strategy
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid header value for {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Pipeline panicked: {0}")]
    Panicked(String),

    #[error("Internal pipeline failure: {0}")]
    Internal(String),
}

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid bind address: {0}")]
    Bind(#[from] std::net::AddrParseError),

    #[error("Upstream request failed: {0}")]
    Upstream(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, GateError>;

/// Result type alias for access provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Result type alias for counter store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_wraps_into_gate_error() {
        let err: GateError = ConfigError::Missing {
            field: "upstream.url".into(),
        }
        .into();
        assert!(matches!(err, GateError::Config(_)));
        assert!(err.to_string().contains("upstream.url"));
    }

    #[test]
    fn test_timeout_messages_carry_budget() {
        let err = ProviderError::Timeout { timeout_ms: 200 };
        assert!(err.to_string().contains("200 ms"));

        let err = StoreError::Timeout { timeout_ms: 150 };
        assert!(err.to_string().contains("150 ms"));
    }

    #[test]
    fn test_panic_becomes_pipeline_error() {
        let err: GateError = PipelineError::Panicked("boom".into()).into();
        assert_eq!(err.to_string(), "Pipeline error: Pipeline panicked: boom");
    }

    #[test]
    fn test_provider_status_error() {
        let err = ProviderError::Status { status: 502 };
        assert_eq!(err.to_string(), "Access provider returned HTTP 502");
    }
}
