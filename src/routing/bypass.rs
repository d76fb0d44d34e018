//! Bypass matching for static assets and framework internals
//!
//! Requests matching here skip the pipeline entirely (headers are still
//! attached). API paths are never eligible; the caller checks that first.

use crate::config::BypassConfig;
use crate::error::ConfigError;
use regex::Regex;

/// Compiled regex pattern list
#[derive(Debug)]
pub struct PatternMatcher {
    patterns: Vec<CompiledPattern>,
}

#[derive(Debug)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl PatternMatcher {
    /// Compile a list of regex patterns
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;

            compiled.push(CompiledPattern {
                source: pattern.clone(),
                regex,
            });
        }

        Ok(Self { patterns: compiled })
    }

    /// Matches nothing
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.regex.is_match(path))
    }

    /// The source of the first matching pattern
    pub fn find_match(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(path))
            .map(|p| p.source.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

/// Why a path was let through without checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassMatch {
    Prefix(String),
    Extension(String),
    Pattern(String),
}

/// Static and internal path detection
#[derive(Debug)]
pub struct BypassMatcher {
    prefixes: Vec<String>,
    extensions: Vec<String>,
    patterns: PatternMatcher,
}

impl BypassMatcher {
    pub fn new(config: &BypassConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            prefixes: config.prefixes.clone(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            patterns: PatternMatcher::new(&config.patterns)?,
        })
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.find_match(path).is_some()
    }

    pub fn find_match(&self, path: &str) -> Option<BypassMatch> {
        if let Some(prefix) = self.prefixes.iter().find(|p| path.starts_with(p.as_str())) {
            return Some(BypassMatch::Prefix(prefix.clone()));
        }

        if let Some(ext) = extension_of(path)
            && self.extensions.iter().any(|e| *e == ext)
        {
            return Some(BypassMatch::Extension(ext));
        }

        self.patterns
            .find_match(path)
            .map(|p| BypassMatch::Pattern(p.to_string()))
    }
}

/// Lowercased extension of the last path segment
fn extension_of(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
