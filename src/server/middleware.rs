//! Gate middleware
//!
//! Runs the gatekeeper in front of every request, renders terminal verdicts
//! and decorates forwarded responses.

use crate::error::PipelineError;
use crate::gate::{GateDecision, GateVerdict, RequestContext};
use crate::routing::RouteClass;
use crate::server::AppState;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, Uri, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Middleware entry point, installed with `middleware::from_fn_with_state`
pub async fn gate_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (mut parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(
        &parts,
        peer,
        &state.trusted_proxies,
        &state.public_scheme,
        state.gate.locales(),
    );

    let mut decision = state.gate.evaluate(&ctx).await;

    let mut response = match apply(&state, &ctx, &decision, &mut parts) {
        Ok(Some(response)) => response,
        Ok(None) => forward(next, parts, body).await,
        Err(e) => {
            decision = state
                .gate
                .fallback(&ctx, decision.resource, decision.route, &e.to_string());
            match apply(&state, &ctx, &decision, &mut parts) {
                Ok(Some(response)) => response,
                Ok(None) => forward(next, parts, body).await,
                Err(e) => {
                    error!(error = %e, path = %ctx.path, "Failed to render fallback verdict");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
    };

    let personalized = matches!(decision.route, Some(RouteClass::Protected | RouteClass::Admin))
        || state.gate.has_session(&ctx);
    if decision.verdict.forwards()
        && let Err(e) = state
            .composer
            .decorate(response.headers_mut(), decision.resource, personalized)
    {
        warn!(error = %e, "Failed to decorate forwarded response");
    }

    let status = response.status();
    state
        .metrics
        .record(&ctx, &decision, Some(status.as_u16()), started.elapsed());

    debug!(
        method = %ctx.method,
        path = %ctx.path,
        status = status.as_u16(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Request gated"
    );

    response
}

/// Render a terminal verdict, or prepare the request parts for forwarding
fn apply(
    state: &AppState,
    ctx: &RequestContext,
    decision: &GateDecision,
    parts: &mut Parts,
) -> Result<Option<Response>, PipelineError> {
    if let Some(response) = state
        .composer
        .terminal(&decision.verdict, decision.resource, ctx)?
    {
        return Ok(Some(response));
    }

    if let GateVerdict::Rewrite { target } = &decision.verdict {
        parts.uri = rewrite_uri(&parts.uri, target)?;
    }

    Ok(None)
}

async fn forward(next: Next, parts: Parts, body: Body) -> Response {
    next.run(Request::from_parts(parts, body)).await
}

/// Replace the path of `uri`, keeping its query
pub fn rewrite_uri(uri: &Uri, target: &str) -> Result<Uri, PipelineError> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", target, query),
        None => target.to_string(),
    };

    let mut builder = Uri::builder().path_and_query(path_and_query);
    if let Some(scheme) = uri.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = uri.authority() {
        builder = builder.authority(authority.clone());
    }

    builder
        .build()
        .map_err(|e| PipelineError::Internal(format!("invalid rewrite target '{}': {}", target, e)))
}
