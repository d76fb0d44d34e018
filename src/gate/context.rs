//! Per-request context
//!
//! Everything the pipeline reads about a request, extracted once and never
//! mutated during evaluation.

use crate::error::ConfigError;
use crate::routing::LocaleResolver;
use crate::session::Cookies;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, header, request::Parts};
use std::net::{IpAddr, SocketAddr};

/// Immutable view of one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Path as received
    pub path: String,
    /// Path with a supported locale prefix removed
    pub stripped_path: String,
    /// Locale carried by the path, or the default
    pub locale: String,
    pub query: Option<String>,
    /// Absolute URL as the client requested it
    pub original_url: String,
    pub client_ip: String,
    pub cookies: Cookies,
    pub headers: HeaderMap,
}

impl RequestContext {
    /// Build from request parts
    ///
    /// `default_scheme` is used when no `x-forwarded-proto` header is present.
    /// Client-IP headers are only read when `peer` is one of `proxies`.
    pub fn from_parts(
        parts: &Parts,
        peer: Option<SocketAddr>,
        proxies: &TrustedProxies,
        default_scheme: &str,
        locales: &LocaleResolver,
    ) -> Self {
        let path = parts.uri.path().to_string();
        let query = parts.uri.query().map(str::to_string);

        let scheme = header_str(&parts.headers, "x-forwarded-proto")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .unwrap_or(default_scheme);
        let host = header_str(&parts.headers, "x-forwarded-host")
            .or_else(|| header_str(&parts.headers, header::HOST.as_str()))
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");

        let original_url = match &query {
            Some(q) => format!("{}://{}{}?{}", scheme, host, path, q),
            None => format!("{}://{}{}", scheme, host, path),
        };

        let cookies = Cookies::parse(
            parts
                .headers
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        Self {
            method: parts.method.clone(),
            stripped_path: locales.strip(&path).to_string(),
            locale: locales.resolve(&path).to_string(),
            path,
            query,
            original_url,
            client_ip: client_ip(&parts.headers, peer.map(|p| p.ip()), proxies),
            cookies,
            headers: parts.headers.clone(),
        }
    }

    /// Builder for tests and synthetic requests
    pub fn builder(method: Method, path: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder::new(method, path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reverse proxies allowed to report the client address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies {
    addrs: Vec<IpAddr>,
}

impl TrustedProxies {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addrs: addrs.into_iter().collect(),
        }
    }

    /// Trust no one: the socket peer is always the client
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse `server.trusted_proxies`
    pub fn parse(entries: &[String]) -> Result<Self, ConfigError> {
        let addrs = entries
            .iter()
            .map(|entry| {
                parse_ip(entry).ok_or_else(|| ConfigError::Invalid {
                    message: format!("server.trusted_proxies: '{}' is not an IP address", entry),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { addrs })
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.addrs.contains(ip)
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

/// Client IP of a request
///
/// From a trusted proxy: `cf-connecting-ip`, `x-real-ip`, first
/// `x-forwarded-for`, skipping values that are not addresses. Otherwise the
/// socket peer. `"unknown"` when there is no peer.
///
/// Forwarding headers from any other peer are ignored; clients can set them.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, proxies: &TrustedProxies) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };

    if proxies.contains(&peer) {
        let forwarded = header_str(headers, "cf-connecting-ip")
            .and_then(parse_ip)
            .or_else(|| header_str(headers, "x-real-ip").and_then(parse_ip))
            // X-Forwarded-For can contain "client, proxy1, proxy2"
            .or_else(|| {
                header_str(headers, "x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .and_then(parse_ip)
            });
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.to_string()
}

/// Parse an address, accepting brackets (`[::1]`)
fn parse_ip(value: &str) -> Option<IpAddr> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}

/// Builder for `RequestContext`
#[derive(Debug, Clone)]
pub struct RequestContextBuilder {
    method: Method,
    path: String,
    query: Option<String>,
    host: String,
    scheme: String,
    client_ip: String,
    cookies: Vec<(String, String)>,
    headers: HeaderMap,
}

impl RequestContextBuilder {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            host: "localhost:8080".to_string(),
            scheme: "http".to_string(),
            client_ip: "127.0.0.1".to_string(),
            cookies: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Add a header; invalid names or values are skipped
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn build(self, locales: &LocaleResolver) -> RequestContext {
        let original_url = match &self.query {
            Some(q) => format!("{}://{}{}?{}", self.scheme, self.host, self.path, q),
            None => format!("{}://{}{}", self.scheme, self.host, self.path),
        };

        RequestContext {
            method: self.method,
            stripped_path: locales.strip(&self.path).to_string(),
            locale: locales.resolve(&self.path).to_string(),
            path: self.path,
            query: self.query,
            original_url,
            client_ip: self.client_ip,
            cookies: self.cookies.into_iter().collect(),
            headers: self.headers,
        }
    }
}
