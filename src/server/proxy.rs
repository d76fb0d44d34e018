//! Upstream proxy
//!
//! Forwards allowed requests to the application and relays its response.

use crate::config::UpstreamConfig;
use crate::error::TransportError;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Headers that describe a single hop and are never forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Reverse proxy to the application
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    client: reqwest::Client,
    base_url: String,
    body_limit: usize,
}

impl UpstreamProxy {
    pub fn new(config: &UpstreamConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            body_limit: config.body_limit_bytes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward a request; upstream failures become a 502
    pub async fn forward(&self, request: Request<Body>) -> Response {
        match self.try_forward(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, upstream = %self.base_url, "Upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    axum::Json(json!({ "error": "Bad gateway" })),
                )
                    .into_response()
            }
        }
    }

    async fn try_forward(&self, request: Request<Body>) -> Result<Response, TransportError> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        let body = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|e| TransportError::Upstream(format!("request body: {}", e)))?;

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        debug!(method = %parts.method, url = %url, "Forwarding request upstream");

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Upstream(e.to_string()))?;

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers());
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| TransportError::Upstream(format!("response body: {}", e)))?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response.headers_mut().remove(header::CONTENT_LENGTH);

        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP {
        out.remove(*name);
    }
    out
}
