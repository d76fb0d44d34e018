//! Configuration loading tests

use dojo_gatekeeper::config::{
    AccessProviderKind, CounterBackend, Environment, FailurePolicy, LocalePrefix, LogFormat,
    load_config, load_config_from_str,
};

const MINIMAL_CONFIG: &str = r#"
[upstream]
url = "http://127.0.0.1:3000"
"#;

const FULL_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 9000
environment = "production"

[upstream]
url = "http://app.internal:3000"
timeout_secs = 10

[locales]
default = "ru"
supported = ["ru", "en", "kk"]
prefix = "as_needed"

[routes]
protected = ["/dashboard", "/learn"]
admin_api = ["/api/admin", "/api/reports"]

[pages]
login = "/signin"

[rate_limits]
backend = "memory"
key_prefix = "test:rl"

[rate_limits.auth]
limit = 5
window_secs = 60

[access]
provider = "http"
timeout_ms = 150

[access.http]
url = "https://config.example.com/access"
cache_ttl_secs = 30

[bypass]
patterns = ["^/healthz$"]

[fallback]
api_read = "closed"

[fallback.overrides]
admin = "closed"

[logging]
level = "debug"
format = "json"

[metrics]
enabled = false
port = 9100
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.upstream.url, "http://127.0.0.1:3000");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.locales.default, "en");
    assert!(matches!(config.locales.prefix, LocalePrefix::Always));
    assert!(matches!(config.rate_limits.backend, CounterBackend::Redis));
    assert!(matches!(config.access.provider, AccessProviderKind::Static));
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9464);
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    // Server
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert!(matches!(config.server.environment, Environment::Production));
    assert!(config.server.is_production());

    // Locales
    assert_eq!(config.locales.default, "ru");
    assert_eq!(config.locales.supported.len(), 3);
    assert!(matches!(config.locales.prefix, LocalePrefix::AsNeeded));

    // Routes replace the defaults per set
    assert_eq!(config.routes.protected, vec!["/dashboard", "/learn"]);
    assert_eq!(config.routes.admin_api.len(), 2);
    assert!(!config.routes.public.is_empty());

    // Pages keep unspecified defaults
    assert_eq!(config.pages.login, "/signin");
    assert_eq!(config.pages.after_login, "/dashboard");

    // Rate limits
    assert!(matches!(config.rate_limits.backend, CounterBackend::Memory));
    assert_eq!(config.rate_limits.auth.limit, 5);
    assert_eq!(config.rate_limits.auth.window_secs, 60);
    assert_eq!(config.rate_limits.api.limit, 200);

    // Access
    assert!(matches!(config.access.provider, AccessProviderKind::Http));
    assert_eq!(config.access.timeout_ms, 150);
    assert_eq!(config.access.http.cache_ttl_secs, 30);

    // Fallback
    assert_eq!(config.fallback.api_read, FailurePolicy::Closed);
    assert_eq!(config.fallback.api_mutating, FailurePolicy::Closed);
    assert_eq!(
        config.fallback.overrides.get("admin"),
        Some(&FailurePolicy::Closed)
    );

    // Logging and metrics
    assert_eq!(config.logging.level, "debug");
    assert!(matches!(config.logging.format, LogFormat::Json));
    assert!(!config.metrics.enabled);
}

#[test]
fn test_invalid_role_hierarchy() {
    let config_str = r#"
[roles.hierarchy]
MODERATOR = ["MODERATOR"]
"#;

    let result = load_config_from_str(config_str);
    assert!(result.is_err());
}

#[test]
fn test_unknown_admin_role() {
    let result = load_config_from_str(
        r#"
[roles]
admin_role = "SUPERUSER"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_page_path_must_start_with_slash() {
    let result = load_config_from_str(
        r#"
[pages]
login = "auth/login"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_unknown_fallback_override() {
    let result = load_config_from_str(
        r#"
[fallback.overrides]
everything = "closed"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_zero_limit_rejected() {
    let result = load_config_from_str(
        r#"
[rate_limits.api]
limit = 0
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_trusted_proxies() {
    let config = load_config_from_str(
        r#"
[server]
trusted_proxies = ["10.0.0.2", "::1"]
"#,
    )
    .unwrap();
    assert_eq!(config.server.trusted_proxies, vec!["10.0.0.2", "::1"]);

    let default = load_config_from_str("").unwrap();
    assert!(default.server.trusted_proxies.is_empty());

    let result = load_config_from_str(
        r#"
[server]
trusted_proxies = ["10.0.0.0/8"]
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_missing_explicit_file() {
    let result = load_config(Some("/nonexistent/dojo-gate.toml"));
    assert!(result.is_err());
}

#[test]
#[serial_test::serial]
fn test_conventional_env_overrides() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("dojo-gate.toml");
    fs::write(
        &config_path,
        r#"
[rate_limits.auth]
limit = 50
window_secs = 900
"#,
    )
    .unwrap();

    unsafe {
        env::set_var("REDIS_URL", "redis://cache.internal:6380");
        env::set_var("RATE_LIMIT_AUTH_ATTEMPTS", "20");
        env::set_var("RATE_LIMIT_REQUESTS_PER_MINUTE", "120");
        env::set_var("NODE_ENV", "production");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert_eq!(config.rate_limits.redis_url, "redis://cache.internal:6380");
    assert_eq!(config.rate_limits.auth.limit, 20);
    // Window from the file survives a limit-only override
    assert_eq!(config.rate_limits.auth.window_secs, 900);
    assert_eq!(config.rate_limits.api.limit, 120);
    assert!(config.server.is_production());

    unsafe {
        env::remove_var("REDIS_URL");
        env::remove_var("RATE_LIMIT_AUTH_ATTEMPTS");
        env::remove_var("RATE_LIMIT_REQUESTS_PER_MINUTE");
        env::remove_var("NODE_ENV");
    }
}

#[test]
#[serial_test::serial]
fn test_prefixed_env_vars() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("dojo-gate.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("DOJO_GATE__SERVER__PORT", "8181");
        env::set_var("DOJO_GATE__RATE_LIMITS__KEY_PREFIX", "staging:rl");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert_eq!(config.server.port, 8181);
    assert_eq!(config.rate_limits.key_prefix, "staging:rl");

    unsafe {
        env::remove_var("DOJO_GATE__SERVER__PORT");
        env::remove_var("DOJO_GATE__RATE_LIMITS__KEY_PREFIX");
    }
}

#[test]
#[serial_test::serial]
fn test_access_config_url_enables_http_provider_settings() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("dojo-gate.toml");
    fs::write(
        &config_path,
        r#"
[access]
provider = "http"
"#,
    )
    .unwrap();

    // Without a URL the HTTP provider is rejected
    assert!(load_config(Some(config_path.to_str().unwrap())).is_err());

    unsafe {
        env::set_var("ACCESS_CONFIG_URL", "https://config.example.com/access");
        env::set_var("ACCESS_CONFIG_TOKEN", "secret");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(
        config.access.http.url.as_deref(),
        Some("https://config.example.com/access")
    );
    assert_eq!(config.access.http.token.as_deref(), Some("secret"));

    unsafe {
        env::remove_var("ACCESS_CONFIG_URL");
        env::remove_var("ACCESS_CONFIG_TOKEN");
    }
}
