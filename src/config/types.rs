//! Configuration types for dojo-gatekeeper
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables. Everything the gate decides on
//! (route pattern sets, role table, rate-limit thresholds, locales, bypass
//! rules) comes from here rather than from compiled-in constants.

use serde::Deserialize;
use std::collections::HashMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Listener settings
    pub server: ServerConfig,

    /// Application the gate forwards allowed requests to
    pub upstream: UpstreamConfig,

    /// Supported locales and negotiation
    pub locales: LocaleConfig,

    /// Route pattern sets per classification
    pub routes: RouteConfig,

    /// Redirect and rewrite targets
    pub pages: PageConfig,

    /// Role hierarchy
    pub roles: RoleConfig,

    /// Session cookie names
    pub session: SessionConfig,

    /// Rate-limit scopes and counter backend
    pub rate_limits: RateLimitConfig,

    /// Access-control provider
    pub access: AccessConfig,

    /// Paths that skip the pipeline
    pub bypass: BypassConfig,

    /// Response header values
    pub headers: HeaderConfig,

    /// Fallback policies for pipeline failures
    pub fallback: FallbackConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics endpoint
    pub metrics: MetricsConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Deployment environment (HSTS is only sent in production)
    pub environment: Environment,

    /// Scheme used to rebuild the original URL when no `x-forwarded-proto` is present
    pub public_scheme: String,

    /// Peer addresses whose client-IP headers are believed. Requests from
    /// any other peer are identified by the socket address alone.
    pub trusted_proxies: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: Environment::Development,
            public_scheme: "http".to_string(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Upstream application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the application (e.g., `http://127.0.0.1:3000`)
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum request body forwarded upstream
    pub body_limit_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 30,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Locale configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Locale used when the path carries no supported prefix
    pub default: String,

    /// Supported locale codes
    pub supported: Vec<String>,

    /// How unprefixed page paths are handled after all checks pass
    pub prefix: LocalePrefix,

    /// Cookie remembering the visitor's locale choice
    pub cookie: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default: "en".to_string(),
            supported: vec!["en".to_string(), "ru".to_string()],
            prefix: LocalePrefix::Always,
            cookie: "NEXT_LOCALE".to_string(),
        }
    }
}

/// Locale prefix mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalePrefix {
    /// Every page path is redirected to a locale-prefixed path
    #[default]
    Always,
    /// The default locale is served unprefixed (internal rewrite)
    AsNeeded,
}

/// Route pattern sets
///
/// A pattern equal to `/` matches only the root path; every other pattern
/// is a prefix. Sets may overlap: classification probes them in a fixed
/// order (pages: protected, admin, public; API: public_api, protected_api,
/// admin_api) and the first match wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Prefix that marks a request as an API request
    pub api_prefix: String,

    pub public: Vec<String>,
    pub protected: Vec<String>,
    pub admin: Vec<String>,
    pub public_api: Vec<String>,
    pub protected_api: Vec<String>,
    pub admin_api: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

        Self {
            api_prefix: "/api".to_string(),
            public: strings(&["/", "/modules", "/topic", "/auth"]),
            protected: strings(&[
                "/dashboard",
                "/profile",
                "/settings",
                "/bookmarks",
                "/progress",
            ]),
            admin: strings(&["/admin"]),
            public_api: strings(&["/api/auth", "/api/health"]),
            protected_api: strings(&["/api/user", "/api/progress", "/api/bookmarks"]),
            admin_api: strings(&["/api/admin"]),
        }
    }
}

/// Page targets used by redirects and rewrites (without locale prefix)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub login: String,
    pub after_login: String,
    pub default_authenticated: String,
    pub maintenance: String,
    pub banned: String,

    /// Query parameter carrying the original URL on login redirects
    pub callback_param: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            after_login: "/dashboard".to_string(),
            default_authenticated: "/dashboard".to_string(),
            maintenance: "/maintenance".to_string(),
            banned: "/banned".to_string(),
            callback_param: "callbackUrl".to_string(),
        }
    }
}

/// Role hierarchy configuration
///
/// Keys are required roles, values the roles that satisfy them. Every entry
/// must list its own role and `ADMIN`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub hierarchy: HashMap<String, Vec<String>>,

    /// Role required by admin pages and admin API routes
    pub admin_role: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        let entry = |required: &str, holders: &[&str]| {
            (
                required.to_string(),
                holders.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            )
        };

        Self {
            hierarchy: HashMap::from([
                entry("USER", &["USER", "MODERATOR", "INSTRUCTOR", "ADMIN"]),
                entry("MODERATOR", &["MODERATOR", "ADMIN"]),
                entry("INSTRUCTOR", &["INSTRUCTOR", "ADMIN"]),
                entry("ADMIN", &["ADMIN"]),
            ]),
            admin_role: "ADMIN".to_string(),
        }
    }
}

/// Session cookie names
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session token cookie names, plain and secure-context variants
    pub token_cookies: Vec<String>,

    /// Role claim cookie (fast-path hint, not authoritative)
    pub role_cookie: String,

    /// User id hint cookie
    pub user_id_cookie: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_cookies: vec![
                "next-auth.session-token".to_string(),
                "__Secure-next-auth.session-token".to_string(),
            ],
            role_cookie: "user-role".to_string(),
            user_id_cookie: "user-id".to_string(),
        }
    }
}

/// Rate-limit configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Counter store backend
    pub backend: CounterBackend,

    /// Redis connection URL (redis:// or rediss://)
    pub redis_url: String,

    /// Prefix for every counter key
    pub key_prefix: String,

    /// Upper bound for one counter store call
    pub timeout_ms: u64,

    /// Path fragments selecting the `auth` scope
    pub auth_markers: Vec<String>,

    /// Path fragments selecting the `export` scope
    pub export_markers: Vec<String>,

    pub api: ScopeLimit,
    pub auth: ScopeLimit,
    pub export: ScopeLimit,
    pub admin: ScopeLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "dojo:rl".to_string(),
            timeout_ms: 250,
            auth_markers: vec!["/auth/".to_string()],
            export_markers: vec!["/export/".to_string()],
            api: ScopeLimit::new(200, 60),
            auth: ScopeLimit::new(20, 300),
            export: ScopeLimit::new(3, 3600),
            admin: ScopeLimit::new(60, 60),
        }
    }
}

/// Counter store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    /// Shared Redis counters (coordinated across instances)
    #[default]
    Redis,
    /// Process-local counters (single instance only)
    Memory,
}

/// Limit and window for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScopeLimit {
    pub limit: u64,
    pub window_secs: u64,
}

impl ScopeLimit {
    pub const fn new(limit: u64, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }
}

/// Access-control provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub provider: AccessProviderKind,

    /// Upper bound for one provider call
    pub timeout_ms: u64,

    /// `Retry-After` sent with maintenance responses
    pub maintenance_retry_after_secs: u64,

    /// Flags served by the static provider
    #[serde(rename = "static")]
    pub static_rules: StaticAccessConfig,

    /// Remote document settings for the HTTP provider
    pub http: HttpAccessConfig,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            provider: AccessProviderKind::Static,
            timeout_ms: 200,
            maintenance_retry_after_secs: 300,
            static_rules: StaticAccessConfig::default(),
            http: HttpAccessConfig::default(),
        }
    }
}

/// Access provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessProviderKind {
    #[default]
    Static,
    Http,
}

/// Static access rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticAccessConfig {
    pub maintenance: bool,
    pub blocked_ips: Vec<String>,
    pub banned_users: Vec<String>,
}

/// Remote access document settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpAccessConfig {
    /// Document URL
    pub url: Option<String>,

    /// Bearer token (prefer env var ACCESS_CONFIG_TOKEN)
    pub token: Option<String>,

    /// How long a fetched document is reused
    pub cache_ttl_secs: u64,
}

impl Default for HttpAccessConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            cache_ttl_secs: 10,
        }
    }
}

/// Bypass configuration
///
/// Only page paths are eligible; API paths always run the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BypassConfig {
    /// Framework-internal and well-known path prefixes
    pub prefixes: Vec<String>,

    /// Static file extensions (without the dot)
    pub extensions: Vec<String>,

    /// Additional regex patterns
    pub patterns: Vec<String>,
}

impl Default for BypassConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

        Self {
            prefixes: strings(&[
                "/_next/static",
                "/_next/image",
                "/_next/data",
                "/favicon.ico",
                "/sitemap.xml",
                "/robots.txt",
            ]),
            extensions: strings(&[
                "ico", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "css", "js", "map",
                "woff", "woff2", "ttf",
            ]),
            patterns: Vec::new(),
        }
    }
}

/// Response header values
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub frame_options: String,
    pub referrer_policy: String,
    pub hsts: String,

    /// Cache-Control for static assets
    pub static_cache: String,

    /// Cache-Control for API responses
    pub api_cache: String,

    /// Cache-Control for pages
    pub page_cache: String,

    /// Cache-Control for pages rendered for a signed-in user (protected and
    /// admin pages, or any page requested with a session token)
    pub private_page_cache: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            frame_options: "DENY".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
            hsts: "max-age=31536000; includeSubDomains".to_string(),
            static_cache: "public, max-age=31536000, immutable".to_string(),
            api_cache: "no-store".to_string(),
            page_cache: "public, max-age=0, s-maxage=60, stale-while-revalidate=300".to_string(),
            private_page_cache: "private, max-age=0, must-revalidate".to_string(),
        }
    }
}

/// What to do when a pipeline run fails unexpectedly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Allow the request and log
    Open,
    /// Deny the request and log
    Closed,
}

/// Fallback policies
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Page requests
    pub pages: FailurePolicy,

    /// API requests with safe methods (GET, HEAD, OPTIONS)
    pub api_read: FailurePolicy,

    /// API requests with mutating methods
    pub api_mutating: FailurePolicy,

    /// Per route class overrides (keys: public, protected, admin, public_api, ...)
    pub overrides: HashMap<String, FailurePolicy>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            pages: FailurePolicy::Open,
            api_read: FailurePolicy::Open,
            api_mutating: FailurePolicy::Closed,
            overrides: HashMap::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,

    /// Number of recent decisions kept for the snapshot
    pub recent_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 9464,
            recent_capacity: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.locales.default, "en");
        assert_eq!(config.rate_limits.auth, ScopeLimit::new(20, 300));
        assert_eq!(config.rate_limits.export, ScopeLimit::new(3, 3600));
        assert_eq!(config.fallback.api_mutating, FailurePolicy::Closed);
        assert!(!config.server.is_production());
    }

    #[test]
    fn test_deserialize_failure_policy() {
        let policy: FailurePolicy = serde_json::from_str(r#""open""#).unwrap();
        assert_eq!(policy, FailurePolicy::Open);

        let policy: FailurePolicy = serde_json::from_str(r#""closed""#).unwrap();
        assert_eq!(policy, FailurePolicy::Closed);
    }

    #[test]
    fn test_deserialize_locale_prefix() {
        let prefix: LocalePrefix = serde_json::from_str(r#""as_needed""#).unwrap();
        assert_eq!(prefix, LocalePrefix::AsNeeded);
    }

    #[test]
    fn test_default_hierarchy_lists_admin_everywhere() {
        let roles = RoleConfig::default();
        for holders in roles.hierarchy.values() {
            assert!(holders.iter().any(|r| r == "ADMIN"));
        }
    }
}
