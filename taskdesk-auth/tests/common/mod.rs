//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Test database and Redis setup
//! - Router construction with test limits
//! - Request helpers returning status and JSON body
//! - Test user registration
//!
//! Tests using `TestContext` need PostgreSQL and Redis
//! (`AUTH_TEST_DATABASE_URL`, `REDIS_URL`) and are marked `#[ignore]`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use taskdesk_auth::{
    app::{build_router, AppState},
    config::Config,
};
use taskdesk_shared::{db::migrations::run_auth_migrations, redis::RedisClient};
use tower::ServiceExt;
use uuid::Uuid;

pub const SERVICE_KEY: &str = "test-service-key-0123456789abcdef";
pub const PASSWORD: &str = "Corr3ct-Horse!";

/// Test configuration; request limits are raised so tests sharing a
/// database do not trip the per-IP limiter, and forwarding headers are
/// trusted so each context can present its own client IP
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert(
        "DATABASE_URL".into(),
        std::env::var("AUTH_TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/taskdesk_auth_test".into()),
    );
    vars.insert(
        "REDIS_URL".into(),
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
    );
    vars.insert("JWT_SECRET".into(), "test-jwt-secret-0123456789abcdef0123".into());
    vars.insert("SERVICE_API_KEY".into(), SERVICE_KEY.into());
    vars.insert("AUTH_RATE_LIMIT_PER_MINUTE".into(), "10000".into());
    vars.insert("LOGIN_IP_MAX_ATTEMPTS".into(), "1000".into());
    vars.insert("TRUST_PROXY_HEADERS".into(), "true".into());
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_vars(&|key: &str| vars.get(key).cloned()).expect("valid test config")
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub redis: RedisClient,
    pub app: Router,
    /// Client IP sent as `X-Forwarded-For`, unique per context
    pub ip: String,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(test_config(&[])).await
    }

    pub async fn with_config(config: Config) -> anyhow::Result<Self> {
        let db = PgPool::connect(&config.database.url).await?;
        run_auth_migrations(&db).await?;

        let redis = RedisClient::new(config.redis.clone()).await?;
        let app = build_router(AppState::new(db.clone(), redis.clone(), config));

        let bytes = Uuid::new_v4().into_bytes();
        let ip = format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]);

        Ok(Self { db, redis, app, ip })
    }

    /// Sends a JSON request and returns status and parsed body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", &self.ip)
            .header("user-agent", "taskdesk-tests");
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
        read_json(response).await
    }

    /// Sends a prepared request, returning status and parsed body
    pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }

    /// Calls verify-token with the given service key
    pub async fn verify(&self, token: &str, service_key: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/auth/verify-token")
            .header("x-service-key", service_key)
            .header("content-type", "application/json")
            .body(Body::from(json!({ "token": token }).to_string()))
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }

    /// Registers a fresh user, returning the response body
    pub async fn register(&self) -> TestUser {
        let suffix = &Uuid::new_v4().simple().to_string()[..12];
        let username = format!("user_{}", suffix);
        let email = format!("{}@example.com", username);

        let (status, body) = self
            .send(
                Method::POST,
                "/v1/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "username": username,
                    "password": PASSWORD,
                    "first_name": "Test"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

        TestUser {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email,
            username,
            access_token: body["access_token"].as_str().unwrap().to_string(),
            refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
            session_id: body["session_id"].as_str().unwrap().parse().unwrap(),
        }
    }

    /// Logs in and returns the token body
    pub async fn login(&self, identifier: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "identifier": identifier, "password": password })),
        )
        .await
    }
}

/// A registered user and its first session
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: Uuid,
}

/// Builds a request carrying only the given headers
pub fn raw_request(
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
