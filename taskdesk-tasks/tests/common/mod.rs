//! Common test utilities for task service integration tests
//!
//! - An in-process stand-in for the auth service's verify-token endpoint
//! - Router construction over a lazy (never connected) pool, or a real one
//! - Request helpers returning status and JSON body
//!
//! Only tests that reach the database need `TASKS_TEST_DATABASE_URL` and are marked
//! `#[ignore]`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use taskdesk_shared::{
    auth::verify::{VerifiedUser, VerifyTokenRequest, VerifyTokenResponse},
    db::{
        migrations::run_task_migrations,
        pool::{create_lazy_pool, PoolConfig},
    },
};
use taskdesk_tasks::{
    app::{build_router, AppState},
    auth_client::AuthServiceClient,
    config::Config,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const SERVICE_KEY: &str = "test-service-key-0123456789abcdef";

/// Token the fake auth service accepts for `ALICE`
pub const ALICE_TOKEN: &str = "alice-token";
/// Token the fake auth service accepts for `BOB`
pub const BOB_TOKEN: &str = "bob-token";
/// Token that makes the fake auth service answer 503
pub const OUTAGE_TOKEN: &str = "outage-token";

pub fn alice() -> VerifiedUser {
    VerifiedUser {
        id: Uuid::from_u128(0xa11ce),
        email: "alice@example.com".to_string(),
        username: "alice".to_string(),
        first_name: Some("Alice".to_string()),
        last_name: None,
        is_verified: true,
    }
}

pub fn bob() -> VerifiedUser {
    VerifiedUser {
        id: Uuid::from_u128(0xb0b),
        email: "bob@example.com".to_string(),
        username: "bob".to_string(),
        first_name: None,
        last_name: None,
        is_verified: false,
    }
}

async fn fake_verify(
    headers: HeaderMap,
    Json(req): Json<VerifyTokenRequest>,
) -> Result<Json<VerifyTokenResponse>, StatusCode> {
    let key = headers.get("x-service-key").and_then(|v| v.to_str().ok());
    if key != Some(SERVICE_KEY) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let expires_at = Utc::now() + Duration::minutes(15);
    match req.token.as_str() {
        ALICE_TOKEN => Ok(Json(VerifyTokenResponse::valid(alice(), Uuid::new_v4(), expires_at))),
        BOB_TOKEN => Ok(Json(VerifyTokenResponse::valid(bob(), Uuid::new_v4(), expires_at))),
        OUTAGE_TOKEN => Err(StatusCode::SERVICE_UNAVAILABLE),
        _ => Ok(Json(VerifyTokenResponse::invalid("Token expired"))),
    }
}

/// Starts the fake auth service on an ephemeral port
pub async fn spawn_fake_auth() -> SocketAddr {
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
        .route("/v1/auth/verify-token", post(fake_verify));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn test_config(auth_url: &str, service_key: &str, database_url: &str) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", database_url.to_string()),
        ("SERVICE_API_KEY", service_key.to_string()),
        ("AUTH_SERVICE_URL", auth_url.to_string()),
        ("AUTH_SERVICE_TIMEOUT_SECS", "2".to_string()),
    ]);
    Config::from_vars(&|key: &str| vars.get(key).cloned()).expect("valid test config")
}

/// Test context over the fake auth service
pub struct TestContext {
    pub app: Router,
    pub db: PgPool,
}

impl TestContext {
    /// Router whose pool never connects; fine for paths that stop before the database
    pub async fn without_database() -> Self {
        let addr = spawn_fake_auth().await;
        Self::build(&format!("http://{}", addr), SERVICE_KEY, None).await
    }

    /// Router pointing at an auth service URL of the caller's choice
    pub async fn with_auth_url(auth_url: &str, service_key: &str) -> Self {
        Self::build(auth_url, service_key, None).await
    }

    /// Router over the real task database (`TASKS_TEST_DATABASE_URL`)
    pub async fn with_database() -> Self {
        let addr = spawn_fake_auth().await;
        let url = std::env::var("TASKS_TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/taskdesk_tasks_test".into());
        Self::build(&format!("http://{}", addr), SERVICE_KEY, Some(url)).await
    }

    async fn build(auth_url: &str, service_key: &str, database_url: Option<String>) -> Self {
        let connected = database_url.is_some();
        let database_url =
            database_url.unwrap_or_else(|| "postgresql://127.0.0.1:1/unreachable".to_string());
        let config = test_config(auth_url, service_key, &database_url);

        let db = if connected {
            let db = PgPool::connect(&database_url).await.unwrap();
            run_task_migrations(&db).await.unwrap();
            db
        } else {
            create_lazy_pool(&PoolConfig {
                url: database_url.clone(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_seconds: 1,
                idle_timeout_seconds: None,
                max_lifetime_seconds: None,
            })
            .unwrap()
        };

        let verifier = Arc::new(AuthServiceClient::new(&config.auth_service).unwrap());
        let app = build_router(AppState::new(db.clone(), verifier, config));

        Self { app, db }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}
