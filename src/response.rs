//! Response composition
//!
//! Renders terminal verdicts and decorates every response leaving the gate
//! with security and caching headers.

use crate::config::{HeaderConfig, PageConfig};
use crate::error::PipelineError;
use crate::gate::{GateVerdict, RequestContext, ResourceClass};
use axum::Json;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

const X_XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");

/// Builds gate responses and response headers
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    headers: HeaderConfig,
    callback_param: String,
    production: bool,
}

impl ResponseComposer {
    pub fn new(headers: &HeaderConfig, pages: &PageConfig, production: bool) -> Self {
        Self {
            headers: headers.clone(),
            callback_param: pages.callback_param.clone(),
            production,
        }
    }

    /// Cache-Control value for a resource class
    pub fn cache_control(&self, resource: ResourceClass) -> &str {
        match resource {
            ResourceClass::Static => &self.headers.static_cache,
            ResourceClass::Api => &self.headers.api_cache,
            ResourceClass::Page => &self.headers.page_cache,
        }
    }

    /// Security headers, always present (HSTS in production only)
    pub fn apply_security_headers(&self, headers: &mut HeaderMap) -> Result<(), PipelineError> {
        headers.insert(
            header::X_FRAME_OPTIONS,
            header_value("x-frame-options", &self.headers.frame_options)?,
        );
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(
            header::REFERRER_POLICY,
            header_value("referrer-policy", &self.headers.referrer_policy)?,
        );
        headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));

        if self.production {
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                header_value("strict-transport-security", &self.headers.hsts)?,
            );
        }

        Ok(())
    }

    /// Decorate a forwarded response. An upstream Cache-Control is kept.
    ///
    /// `personalized` pages (rendered for a signed-in user) are never given a
    /// shared-cache directive, and every page varies on `Cookie`.
    pub fn decorate(
        &self,
        headers: &mut HeaderMap,
        resource: ResourceClass,
        personalized: bool,
    ) -> Result<(), PipelineError> {
        self.apply_security_headers(headers)?;

        if !headers.contains_key(header::CACHE_CONTROL) {
            let cache = match resource {
                ResourceClass::Page if personalized => {
                    self.headers.private_page_cache.as_str()
                }
                _ => self.cache_control(resource),
            };
            headers.insert(header::CACHE_CONTROL, header_value("cache-control", cache)?);
        }

        if resource == ResourceClass::Page && !varies_on_cookie(headers) {
            headers.append(header::VARY, HeaderValue::from_static("Cookie"));
        }

        Ok(())
    }

    /// Final `Location` for a redirect
    ///
    /// With `preserve_callback` the original URL is appended as the callback
    /// query parameter.
    pub fn redirect_location(
        &self,
        location: &str,
        preserve_callback: bool,
        original_url: &str,
    ) -> String {
        if !preserve_callback {
            return location.to_string();
        }

        let separator = if location.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            location,
            separator,
            self.callback_param,
            urlencoding::encode(original_url)
        )
    }

    /// Render a terminal verdict (`Redirect` or `Reject`)
    ///
    /// Returns `Ok(None)` for verdicts that forward the request.
    pub fn terminal(
        &self,
        verdict: &GateVerdict,
        resource: ResourceClass,
        ctx: &RequestContext,
    ) -> Result<Option<Response>, PipelineError> {
        let mut response = match verdict {
            GateVerdict::Allow | GateVerdict::Rewrite { .. } => return Ok(None),
            GateVerdict::Redirect {
                location,
                preserve_callback,
            } => {
                let location =
                    self.redirect_location(location, *preserve_callback, &ctx.original_url);
                let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
                response
                    .headers_mut()
                    .insert(header::LOCATION, header_value("location", &location)?);
                response
            }
            GateVerdict::Reject {
                status,
                body,
                headers,
            } => {
                let mut response = match body {
                    Some(message) => (*status, Json(json!({ "error": message }))).into_response(),
                    None => status.into_response(),
                };
                for (name, value) in headers {
                    response
                        .headers_mut()
                        .insert(name.clone(), header_value(name.as_str(), value)?);
                }
                response
            }
        };

        // Gate responses depend on cookies and must not be shared by caches
        let headers = response.headers_mut();
        self.apply_security_headers(headers)?;
        let cache = match resource {
            ResourceClass::Static => self.cache_control(resource),
            _ => self.cache_control(ResourceClass::Api),
        };
        headers.insert(header::CACHE_CONTROL, header_value("cache-control", cache)?);

        Ok(Some(response))
    }
}

fn varies_on_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| {
            let v = v.trim();
            v == "*" || v.eq_ignore_ascii_case("cookie")
        })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, PipelineError> {
    HeaderValue::from_str(value).map_err(|e| PipelineError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
