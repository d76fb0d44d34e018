//! Metrics endpoint tests

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use dojo_gatekeeper::gate::{
    DecisionNotes, DenyReason, GateDecision, GateVerdict, RequestContext, ResourceClass,
};
use dojo_gatekeeper::metrics::{GateMetrics, metrics_router};
use dojo_gatekeeper::routing::{LocaleResolver, RouteClass};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn get_json(metrics: Arc<GateMetrics>, uri: &str) -> Value {
    let response = metrics_router(metrics)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let body = get_json(Arc::new(GateMetrics::new()), "/health").await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_snapshot_endpoint() {
    let metrics = Arc::new(GateMetrics::new());
    let locales = LocaleResolver::default();

    let ctx = RequestContext::builder(Method::GET, "/api/progress").build(&locales);
    let decision = GateDecision::new(
        GateVerdict::reject(StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
        ResourceClass::Api,
        Some(RouteClass::ProtectedApi),
    )
    .with_reason(DenyReason::QuotaExceeded);
    metrics.record(&ctx, &decision, Some(429), Duration::from_micros(120));

    let ctx = RequestContext::builder(Method::POST, "/api/progress").build(&locales);
    let decision = GateDecision::new(
        GateVerdict::reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        ResourceClass::Api,
        Some(RouteClass::ProtectedApi),
    )
    .with_notes(DecisionNotes {
        fallback: true,
        ..Default::default()
    });
    metrics.record(&ctx, &decision, Some(500), Duration::from_micros(80));

    let body = get_json(metrics, "/metrics").await;

    assert_eq!(body["total_requests"], 2);
    assert_eq!(body["fallbacks"], 1);
    assert_eq!(body["verdicts"][0]["name"], "reject");
    assert_eq!(body["verdicts"][0]["count"], 2);
    assert_eq!(body["routes"][0]["name"], "protected_api");
    assert_eq!(body["reasons"][0]["name"], "quota_exceeded");
    assert_eq!(body["recent"][0]["status"], 429);
    assert_eq!(body["recent"][1]["method"], "POST");
    assert_eq!(body["recent"][1]["fallback"], true);
}
