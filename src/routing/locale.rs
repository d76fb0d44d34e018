//! Locale resolution and negotiation
//!
//! The single place that knows how locale prefixes look. Classification,
//! redirect targets and residual negotiation all go through one
//! `LocaleResolver`.

use crate::config::{LocaleConfig, LocalePrefix};

/// Outcome of residual locale negotiation for a page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// Path already carries a supported locale
    Forward,
    /// Send the client to the prefixed path (query preserved)
    Redirect(String),
    /// Serve the prefixed path internally without changing the URL
    Rewrite(String),
}

/// Locale prefix handling
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    default: String,
    supported: Vec<String>,
    prefix: LocalePrefix,
}

impl LocaleResolver {
    /// Create a resolver. `default` should be one of `supported`.
    pub fn new(default: impl Into<String>, supported: Vec<String>, prefix: LocalePrefix) -> Self {
        Self {
            default: default.into(),
            supported,
            prefix,
        }
    }

    pub fn from_config(config: &LocaleConfig) -> Self {
        Self::new(config.default.clone(), config.supported.clone(), config.prefix)
    }

    pub fn default_locale(&self) -> &str {
        &self.default
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn is_supported(&self, locale: &str) -> bool {
        self.supported.iter().any(|l| l == locale)
    }

    /// Supported locale carried by the first path segment, if any
    pub fn locale_of<'a>(&self, path: &'a str) -> Option<&'a str> {
        let segment = path.strip_prefix('/')?.split('/').next()?;
        self.is_supported(segment).then_some(segment)
    }

    /// Locale of the path, falling back to the default
    pub fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        self.locale_of(path).unwrap_or(self.default.as_str())
    }

    /// Remove a supported locale prefix: `/ru` → `/`, `/ru/x` → `/x`.
    ///
    /// Paths whose first segment is not a supported locale are returned
    /// unchanged.
    pub fn strip<'a>(&self, path: &'a str) -> &'a str {
        let Some(locale) = self.locale_of(path) else {
            return path;
        };

        let rest = &path[locale.len() + 1..];
        if rest.is_empty() { "/" } else { rest }
    }

    /// Prefix `target` with `locale`: (`ru`, `/auth/login`) → `/ru/auth/login`
    pub fn localize(&self, locale: &str, target: &str) -> String {
        if target == "/" || target.is_empty() {
            format!("/{}", locale)
        } else if target.starts_with('/') {
            format!("/{}{}", locale, target)
        } else {
            format!("/{}/{}", locale, target)
        }
    }

    /// Decide what to do with a page request that passed every check
    pub fn negotiate(
        &self,
        path: &str,
        query: Option<&str>,
        locale_cookie: Option<&str>,
        accept_language: Option<&str>,
    ) -> Negotiation {
        if self.locale_of(path).is_some() {
            return Negotiation::Forward;
        }

        let locale = self.preferred(locale_cookie, accept_language);
        let target = self.localize(locale, path);

        match self.prefix {
            LocalePrefix::AsNeeded if locale == self.default => Negotiation::Rewrite(target),
            _ => Negotiation::Redirect(match query {
                Some(q) if !q.is_empty() => format!("{}?{}", target, q),
                _ => target,
            }),
        }
    }

    /// Cookie, then `Accept-Language`, then the default
    pub fn preferred<'a>(
        &'a self,
        locale_cookie: Option<&'a str>,
        accept_language: Option<&'a str>,
    ) -> &'a str {
        if let Some(cookie) = locale_cookie
            && self.is_supported(cookie)
        {
            return cookie;
        }

        accept_language
            .and_then(|header| self.match_accept_language(header))
            .unwrap_or(self.default.as_str())
    }

    fn match_accept_language(&self, header: &str) -> Option<&str> {
        let mut ranges: Vec<(&str, f32)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.trim().split(';');
                let tag = pieces.next()?.trim();
                if tag.is_empty() {
                    return None;
                }

                let quality = pieces
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);

                (quality > 0.0).then_some((tag, quality))
            })
            .collect();

        // Stable sort keeps header order for equal weights
        ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

        ranges.into_iter().find_map(|(tag, _)| {
            let primary = tag.split('-').next()?.to_ascii_lowercase();
            self.supported
                .iter()
                .find(|l| **l == primary)
                .map(String::as_str)
        })
    }
}

impl Default for LocaleResolver {
    fn default() -> Self {
        Self::from_config(&LocaleConfig::default())
    }
}
