//! Integration tests for the webhook ingestion endpoint.
//!
//! Drives the full HTTP surface over the in-memory collaborator backend:
//! signature enforcement, acknowledgment contract, and partial-failure
//! behavior as the provider sees it.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::TimeZone;
use tower::ServiceExt;
use voxlead_api::{create_router, AppState, SIGNATURE_HEADER};
use voxlead_core::{time::{Clock, TestClock}, NoOpEventHandler};
use voxlead_ingest::{collaborators::mock::InMemoryBackend, IngestPipeline};
use voxlead_testing::{sample_analytics, signed_header, test_agent, NotificationBuilder};

const SECRET: &str = "wh_endpoint_secret";

fn fixed_clock() -> TestClock {
    TestClock::at(chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
}

fn router_with(backend: &Arc<InMemoryBackend>, secret: Option<&str>, clock: TestClock) -> Router {
    let pipeline = Arc::new(IngestPipeline::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        Arc::new(NoOpEventHandler::new()),
    ));
    let state = AppState::new(pipeline, secret.map(ToString::to_string), Arc::new(clock));
    create_router(state, 30)
}

fn webhook_request(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/call-completed")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body)).expect("build request")
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse response json")
}

#[tokio::test]
async fn signed_webhook_processes_and_acknowledges() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let clock = fixed_clock();
    let now = clock.now_utc().timestamp();
    let app = router_with(&backend, Some(SECRET), clock);

    let body = NotificationBuilder::new()
        .conversation("conv_http_001")
        .analysis(sample_analytics())
        .body();
    let signature = signed_header(&body, SECRET, now);

    let response =
        app.oneshot(webhook_request(body, Some(signature))).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let ack = response_json(response).await;
    assert_eq!(ack["success"], true);
    assert!(ack["processing_time_ms"].is_number());

    assert_eq!(backend.call_count().await, 1);
    assert!(backend.call_for("conv_http_001").await.is_some());
}

#[tokio::test]
async fn bad_signature_is_rejected_before_any_write() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let clock = fixed_clock();
    let now = clock.now_utc().timestamp();
    let app = router_with(&backend, Some(SECRET), clock);

    let body = NotificationBuilder::new().conversation("conv_http_bad").body();
    let signature = signed_header(&body, "wrong secret", now);

    let response =
        app.oneshot(webhook_request(body, Some(signature))).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let ack = response_json(response).await;
    assert_eq!(ack["success"], false);

    assert_eq!(backend.call_count().await, 0);
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let clock = fixed_clock();
    let now = clock.now_utc().timestamp();
    let app = router_with(&backend, Some(SECRET), clock);

    let body = NotificationBuilder::new().conversation("conv_http_stale").body();
    let signature = signed_header(&body, SECRET, now - 301);

    let response =
        app.oneshot(webhook_request(body, Some(signature))).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(backend.call_count().await, 0);
}

#[tokio::test]
async fn missing_secret_accepts_unsigned_webhooks() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    let app = router_with(&backend, None, fixed_clock());

    let body = NotificationBuilder::new().conversation("conv_http_unsigned").body();

    let response = app.oneshot(webhook_request(body, None)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.call_count().await, 1);
}

#[tokio::test]
async fn unknown_agent_returns_failed_ack() {
    let backend = Arc::new(InMemoryBackend::new());
    let app = router_with(&backend, None, fixed_clock());

    let body =
        NotificationBuilder::new().agent("agent_prov_nobody").conversation("conv_http_404").body();

    let response = app.oneshot(webhook_request(body, None)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let ack = response_json(response).await;
    assert_eq!(ack["success"], false);
    assert!(ack["error"].as_str().unwrap_or_default().contains("E1004"));
}

#[tokio::test]
async fn non_json_body_returns_failed_ack() {
    let backend = Arc::new(InMemoryBackend::new());
    let app = router_with(&backend, None, fixed_clock());

    let response = app
        .oneshot(webhook_request(b"this is not json".to_vec(), None))
        .await
        .expect("execute request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let ack = response_json(response).await;
    assert_eq!(ack["success"], false);
}

#[tokio::test]
async fn unrecognized_shape_returns_failed_ack() {
    let backend = Arc::new(InMemoryBackend::new());
    let app = router_with(&backend, None, fixed_clock());

    let body = serde_json::json!({"event": "unrelated.notification"}).to_string().into_bytes();
    let response = app.oneshot(webhook_request(body, None)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let ack = response_json(response).await;
    assert!(ack["error"].as_str().unwrap_or_default().contains("E1003"));
}

#[tokio::test]
async fn partial_side_effect_failure_is_invisible_to_the_provider() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_agent(test_agent("agent_prov_test")).await;
    backend.fail_contacts(true);
    let app = router_with(&backend, None, fixed_clock());

    let body = NotificationBuilder::new()
        .conversation("conv_http_partial")
        .analysis(sample_analytics())
        .body();

    let response = app.oneshot(webhook_request(body, None)).await.expect("execute request");

    // The provider still sees success; degradation is a data-quality
    // concern, not an HTTP one.
    assert_eq!(response.status(), StatusCode::OK);
    let ack = response_json(response).await;
    assert_eq!(ack["success"], true);

    let call = backend.call_for("conv_http_partial").await.expect("call persisted");
    assert!(backend.analytics_for(call.id).await.is_some());
}

#[tokio::test]
async fn health_check_is_static_and_healthy() {
    let backend = Arc::new(InMemoryBackend::new());
    let app = router_with(&backend, Some(SECRET), fixed_clock());

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let health = response_json(response).await;
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let backend = Arc::new(InMemoryBackend::new());
    let app = router_with(&backend, None, fixed_clock());

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("execute request");

    assert!(response.headers().contains_key("X-Request-Id"));
}
