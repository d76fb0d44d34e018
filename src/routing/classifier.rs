//! Route classification
//!
//! Six pattern sets, probed in a fixed order. Sets may overlap; the first
//! matching class wins:
//!
//! ```text
//! pages: protected → admin → public
//! api:   public_api → protected_api → admin_api
//! ```
//!
//! Patterns are matched against the locale-stripped path. `/` matches only
//! the root; any other pattern matches by prefix.

use crate::config::RouteConfig;
use serde::Serialize;
use std::fmt;

/// Route classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Public,
    Protected,
    Admin,
    PublicApi,
    ProtectedApi,
    AdminApi,
}

impl RouteClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::Protected => "protected",
            RouteClass::Admin => "admin",
            RouteClass::PublicApi => "public_api",
            RouteClass::ProtectedApi => "protected_api",
            RouteClass::AdminApi => "admin_api",
        }
    }

    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(RouteClass::Public),
            "protected" => Some(RouteClass::Protected),
            "admin" => Some(RouteClass::Admin),
            "public_api" => Some(RouteClass::PublicApi),
            "protected_api" => Some(RouteClass::ProtectedApi),
            "admin_api" => Some(RouteClass::AdminApi),
            _ => None,
        }
    }

    pub const fn is_api(&self) -> bool {
        matches!(
            self,
            RouteClass::PublicApi | RouteClass::ProtectedApi | RouteClass::AdminApi
        )
    }

    /// Classes that need a session
    pub const fn requires_session(&self) -> bool {
        matches!(
            self,
            RouteClass::Protected | RouteClass::ProtectedApi | RouteClass::AdminApi
        )
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of route prefixes
#[derive(Debug, Clone, Default)]
pub struct RoutePatterns {
    patterns: Vec<String>,
}

impl RoutePatterns {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.to_vec(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.find_match(path).is_some()
    }

    /// First pattern matching `path`
    pub fn find_match(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| {
                if pattern.as_str() == "/" {
                    path == "/"
                } else {
                    path.starts_with(pattern.as_str())
                }
            })
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// Classifies locale-stripped paths
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    api_prefix: String,
    public: RoutePatterns,
    protected: RoutePatterns,
    admin: RoutePatterns,
    public_api: RoutePatterns,
    protected_api: RoutePatterns,
    admin_api: RoutePatterns,
}

impl RouteClassifier {
    pub fn new(config: &RouteConfig) -> Self {
        Self {
            api_prefix: config.api_prefix.trim_end_matches('/').to_string(),
            public: RoutePatterns::new(&config.public),
            protected: RoutePatterns::new(&config.protected),
            admin: RoutePatterns::new(&config.admin),
            public_api: RoutePatterns::new(&config.public_api),
            protected_api: RoutePatterns::new(&config.protected_api),
            admin_api: RoutePatterns::new(&config.admin_api),
        }
    }

    /// `/api` itself or anything under `/api/`
    pub fn is_api_path(&self, path: &str) -> bool {
        path.strip_prefix(self.api_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Classify a locale-stripped path. `None` when no set matches.
    pub fn classify(&self, path: &str) -> Option<RouteClass> {
        let order: [(&RoutePatterns, RouteClass); 3] = if self.is_api_path(path) {
            [
                (&self.public_api, RouteClass::PublicApi),
                (&self.protected_api, RouteClass::ProtectedApi),
                (&self.admin_api, RouteClass::AdminApi),
            ]
        } else {
            [
                (&self.protected, RouteClass::Protected),
                (&self.admin, RouteClass::Admin),
                (&self.public, RouteClass::Public),
            ]
        };

        order
            .into_iter()
            .find(|(patterns, _)| patterns.matches(path))
            .map(|(_, class)| class)
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.classify(path) == Some(RouteClass::Protected)
    }

    pub fn is_admin(&self, path: &str) -> bool {
        matches!(
            self.classify(path),
            Some(RouteClass::Admin | RouteClass::AdminApi)
        )
    }

    pub fn is_public_api(&self, path: &str) -> bool {
        self.classify(path) == Some(RouteClass::PublicApi)
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new(&RouteConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_matches_exactly() {
        let patterns = RoutePatterns::new(&["/".to_string()]);
        assert!(patterns.matches("/"));
        assert!(!patterns.matches("/modules"));
    }

    #[test]
    fn test_prefix_match() {
        let patterns = RoutePatterns::new(&["/dashboard".to_string()]);
        assert!(patterns.matches("/dashboard"));
        assert!(patterns.matches("/dashboard/stats"));
        assert!(!patterns.matches("/"));
        assert_eq!(patterns.find_match("/dashboard/x"), Some("/dashboard"));
    }

    #[test]
    fn test_default_classification() {
        let classifier = RouteClassifier::default();
        assert_eq!(classifier.classify("/"), Some(RouteClass::Public));
        assert_eq!(classifier.classify("/topic/ownership"), Some(RouteClass::Public));
        assert_eq!(classifier.classify("/dashboard"), Some(RouteClass::Protected));
        assert_eq!(classifier.classify("/admin/users"), Some(RouteClass::Admin));
        assert_eq!(classifier.classify("/api/auth/session"), Some(RouteClass::PublicApi));
        assert_eq!(classifier.classify("/api/user/me"), Some(RouteClass::ProtectedApi));
        assert_eq!(classifier.classify("/api/admin/stats"), Some(RouteClass::AdminApi));
        assert_eq!(classifier.classify("/api/unknown"), None);
        assert_eq!(classifier.classify("/pricing"), None);
    }

    #[test]
    fn test_api_path_detection() {
        let classifier = RouteClassifier::default();
        assert!(classifier.is_api_path("/api"));
        assert!(classifier.is_api_path("/api/user"));
        assert!(!classifier.is_api_path("/apis"));
        assert!(!classifier.is_api_path("/"));
    }

    #[test]
    fn test_class_names_roundtrip() {
        for class in [
            RouteClass::Public,
            RouteClass::Protected,
            RouteClass::Admin,
            RouteClass::PublicApi,
            RouteClass::ProtectedApi,
            RouteClass::AdminApi,
        ] {
            assert_eq!(RouteClass::try_parse(class.as_str()), Some(class));
        }
        assert_eq!(RouteClass::try_parse("static"), None);
    }
}
