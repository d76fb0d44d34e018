//! Session presence probe
//!
//! Reads cookies only. A session token proves that *some* session exists; it
//! is not verified here. The role and user id cookies are hints used for
//! edge decisions and rate-limit identity; the application re-checks both.

use crate::config::SessionConfig;
use crate::rbac::Role;
use std::collections::HashMap;

/// Parsed `Cookie` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    values: HashMap<String, String>,
}

impl Cookies {
    /// Parse one or more `Cookie` header values (`a=1; b=2`).
    ///
    /// The first occurrence of a name wins. Pairs without `=` are skipped.
    pub fn parse<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut values = HashMap::new();

        for header in headers {
            for pair in header.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }

                let value = value.trim().trim_matches('"');
                values
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value of a cookie, treating an empty value as absent
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Cookies {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// What the cookies say about the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub present: bool,
    pub user_id: Option<String>,
    pub role: Option<Role>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Derives a `Session` from request cookies
#[derive(Debug, Clone)]
pub struct SessionProbe {
    token_cookies: Vec<String>,
    role_cookie: String,
    user_id_cookie: String,
}

impl SessionProbe {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            token_cookies: config.token_cookies.clone(),
            role_cookie: config.role_cookie.clone(),
            user_id_cookie: config.user_id_cookie.clone(),
        }
    }

    /// Build the session view. Missing cookies mean an anonymous caller;
    /// this never fails.
    pub fn probe(&self, cookies: &Cookies) -> Session {
        let present = self
            .token_cookies
            .iter()
            .any(|name| cookies.non_empty(name).is_some());

        if !present {
            return Session::anonymous();
        }

        let role = cookies.non_empty(&self.role_cookie).and_then(|raw| {
            let role = Role::try_parse(raw);
            if role.is_none() {
                tracing::debug!(role = %raw, "Ignoring unknown role claim");
            }
            role
        });

        Session {
            present,
            user_id: cookies.non_empty(&self.user_id_cookie).map(str::to_string),
            role,
        }
    }
}

impl Default for SessionProbe {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}
