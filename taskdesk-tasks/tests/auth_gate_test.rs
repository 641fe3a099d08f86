/// Tests for the task service's token gate
///
/// These run against an in-process stand-in for the auth service and a
/// pool that never connects, so no external services are needed.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestContext, ALICE_TOKEN, OUTAGE_TOKEN, SERVICE_KEY};
use serde_json::json;

#[tokio::test]
async fn test_missing_bearer_is_unauthorized() {
    let ctx = TestContext::without_database().await;

    let (status, body) = ctx.send(Method::GET, "/v1/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_wrong_scheme_is_bad_request() {
    let ctx = TestContext::without_database().await;

    let request = axum::http::Request::builder()
        .uri("/v1/categories")
        .header("authorization", "Basic YWxpY2U6c2VjcmV0")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejected_token_passes_reason_through() {
    let ctx = TestContext::without_database().await;

    let (status, body) = ctx
        .send(Method::GET, "/v1/categories", Some("stale-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired");
}

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let ctx = TestContext::without_database().await;

    // Validation runs before any query, so a 422 proves the gate let us in
    let (status, body) = ctx
        .send(
            Method::POST,
            "/v1/tasks",
            Some(ALICE_TOKEN),
            Some(json!({ "title": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "title");
}

#[tokio::test]
async fn test_auth_service_error_is_unavailable() {
    let ctx = TestContext::without_database().await;

    let (status, body) = ctx
        .send(Method::GET, "/v1/tasks", Some(OUTAGE_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Authentication service unavailable");
}

#[tokio::test]
async fn test_wrong_service_key_is_unavailable() {
    let addr = common::spawn_fake_auth().await;
    let ctx = TestContext::with_auth_url(
        &format!("http://{}", addr),
        "some-other-service-key-0123456789ab",
    )
    .await;

    let (status, body) = ctx
        .send(Method::GET, "/v1/tasks", Some(ALICE_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Service authentication failed");
}

#[tokio::test]
async fn test_unreachable_auth_service() {
    let ctx = TestContext::with_auth_url("http://127.0.0.1:9", SERVICE_KEY).await;

    let (status, body) = ctx
        .send(Method::GET, "/v1/tasks", Some(ALICE_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Authentication service unreachable");
}

#[tokio::test]
async fn test_health_without_database_is_degraded() {
    let ctx = TestContext::without_database().await;

    let (status, body) = ctx.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["auth_service"], "reachable");
}

#[tokio::test]
async fn test_security_headers_present() {
    let ctx = TestContext::without_database().await;

    let request = axum::http::Request::builder()
        .uri("/v1/tasks")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-frame-options"));
}
