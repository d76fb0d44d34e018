//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Conventional deployment variables (REDIS_URL, RATE_LIMIT_*, ...)
//! 2. Environment variables (DOJO_GATE__*)
//! 3. Configuration file (TOML)
//! 4. Default values

use crate::config::types::{GateConfig, RateLimitConfig};
use crate::error::ConfigError;
use crate::gate::TrustedProxies;
use crate::rbac::{Role, RoleHierarchy};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "dojo-gate.toml",
    ".dojo-gate.toml",
    "~/.config/dojo-gate/config.toml",
    "/etc/dojo-gate/config.toml",
];

/// Deployment variables mapped onto configuration keys
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("REDIS_URL", "rate_limits.redis_url"),
    ("RATE_LIMIT_REQUESTS_PER_MINUTE", "rate_limits.api.limit"),
    ("RATE_LIMIT_AUTH_ATTEMPTS", "rate_limits.auth.limit"),
    ("RATE_LIMIT_EXPORT_REQUESTS", "rate_limits.export.limit"),
    ("ACCESS_CONFIG_URL", "access.http.url"),
    ("ACCESS_CONFIG_TOKEN", "access.http.token"),
    ("UPSTREAM_URL", "upstream.url"),
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<GateConfig, ConfigError> {
    let builder = with_scope_defaults(Config::builder())?
        .add_source(File::from_str(toml_str, FileFormat::Toml));

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let gate_config: GateConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&gate_config)?;

    Ok(gate_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<GateConfig, ConfigError> {
    // 1. Defaults come from serde defaults on GateConfig; scope tables need
    //    explicit defaults so a partial override still deserializes
    let mut builder = with_scope_defaults(Config::builder())?;

    // 2. Configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // First existing default path wins
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. DOJO_GATE__RATE_LIMITS__AUTH__LIMIT -> rate_limits.auth.limit
    builder = builder.add_source(
        Environment::with_prefix("DOJO_GATE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    // 4. Conventional deployment variables
    for (env_var, key) in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(env_var)
            && !value.is_empty()
        {
            builder = builder
                .set_override(*key, value)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }
    }

    if std::env::var("NODE_ENV").is_ok_and(|v| v == "production") {
        builder = builder
            .set_override("server.environment", "production")
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let gate_config: GateConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&gate_config)?;

    Ok(gate_config)
}

fn with_scope_defaults(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = RateLimitConfig::default();

    for (scope, limit) in [
        ("api", defaults.api),
        ("auth", defaults.auth),
        ("export", defaults.export),
        ("admin", defaults.admin),
    ] {
        builder = builder
            .set_default(format!("rate_limits.{}.limit", scope), limit.limit)
            .and_then(|b| {
                b.set_default(
                    format!("rate_limits.{}.window_secs", scope),
                    limit.window_secs,
                )
            })
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    Ok(builder)
}

/// Validate configuration values
pub fn validate_config(config: &GateConfig) -> Result<(), ConfigError> {
    // Listener
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    TrustedProxies::parse(&config.server.trusted_proxies)?;

    // Upstream
    validate_url(&config.upstream.url, "upstream.url")?;
    if config.upstream.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "upstream.timeout_secs must be greater than 0".to_string(),
        });
    }

    // Locales
    if config.locales.supported.is_empty() {
        return Err(ConfigError::Missing {
            field: "locales.supported".to_string(),
        });
    }
    if !config.locales.supported.contains(&config.locales.default) {
        return Err(ConfigError::Invalid {
            message: format!(
                "locales.default '{}' is not in locales.supported",
                config.locales.default
            ),
        });
    }

    // Pages
    for (field, path) in [
        ("pages.login", &config.pages.login),
        ("pages.after_login", &config.pages.after_login),
        ("pages.default_authenticated", &config.pages.default_authenticated),
        ("pages.maintenance", &config.pages.maintenance),
        ("pages.banned", &config.pages.banned),
    ] {
        validate_path(path, field)?;
    }

    // Route patterns
    validate_path(&config.routes.api_prefix, "routes.api_prefix")?;
    for (field, patterns) in [
        ("routes.public", &config.routes.public),
        ("routes.protected", &config.routes.protected),
        ("routes.admin", &config.routes.admin),
        ("routes.public_api", &config.routes.public_api),
        ("routes.protected_api", &config.routes.protected_api),
        ("routes.admin_api", &config.routes.admin_api),
    ] {
        for pattern in patterns {
            validate_path(pattern, field)?;
        }
    }

    // Roles
    RoleHierarchy::from_config(&config.roles)?;
    if Role::try_parse(&config.roles.admin_role).is_none() {
        return Err(ConfigError::Invalid {
            message: format!("roles.admin_role '{}' is not a role", config.roles.admin_role),
        });
    }

    // Session
    if config.session.token_cookies.is_empty() {
        return Err(ConfigError::Missing {
            field: "session.token_cookies".to_string(),
        });
    }

    // Rate limits
    if config.rate_limits.timeout_ms == 0 {
        return Err(ConfigError::Invalid {
            message: "rate_limits.timeout_ms must be greater than 0".to_string(),
        });
    }
    for (scope, limit) in [
        ("api", &config.rate_limits.api),
        ("auth", &config.rate_limits.auth),
        ("export", &config.rate_limits.export),
        ("admin", &config.rate_limits.admin),
    ] {
        if limit.limit == 0 || limit.window_secs == 0 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "rate_limits.{} needs a non-zero limit and window_secs",
                    scope
                ),
            });
        }
    }

    // Access provider
    if config.access.timeout_ms == 0 {
        return Err(ConfigError::Invalid {
            message: "access.timeout_ms must be greater than 0".to_string(),
        });
    }
    if config.access.provider == crate::config::AccessProviderKind::Http {
        match &config.access.http.url {
            Some(url) => validate_url(url, "access.http.url")?,
            None => {
                return Err(ConfigError::Missing {
                    field: "access.http.url (set ACCESS_CONFIG_URL environment variable)"
                        .to_string(),
                });
            }
        }
    }

    // Bypass regexes
    validate_patterns(&config.bypass.patterns, "bypass.patterns")?;

    // Fallback overrides
    for class in config.fallback.overrides.keys() {
        if crate::routing::RouteClass::try_parse(class).is_none() {
            return Err(ConfigError::Invalid {
                message: format!("fallback.overrides: unknown route class '{}'", class),
            });
        }
    }

    Ok(())
}

fn validate_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::Missing {
            field: field.to_string(),
        });
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Invalid {
            message: format!("{} must start with http:// or https://, got: {}", field, url),
        });
    }

    Ok(())
}

fn validate_path(path: &str, field: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') {
        return Err(ConfigError::Invalid {
            message: format!("{} entries must start with '/', got: {}", field, path),
        });
    }
    Ok(())
}

/// Validate that all patterns are valid regex
fn validate_patterns(patterns: &[String], field_path: &str) -> Result<(), ConfigError> {
    for pattern in patterns {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: format!("in {}: {}", field_path, e),
            });
        }
    }
    Ok(())
}
