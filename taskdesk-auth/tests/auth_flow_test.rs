/// Integration tests for the authentication service
///
/// These tests run the full router against PostgreSQL and Redis:
/// - Registration, login and profile access
/// - Login lockout
/// - Refresh rotation and reuse detection
/// - Logout, password change and account deletion
/// - Service-to-service token verification
/// - Login audit rows, client header handling and expired-row purging
///
/// Run with `cargo test -p taskdesk-auth -- --ignored`.

mod common;

use axum::{
    extract::ConnectInfo,
    http::{Method, StatusCode},
};
use chrono::{Duration, Utc};
use common::{raw_request, test_config, TestContext, PASSWORD, SERVICE_KEY};
use serde_json::json;
use std::net::SocketAddr;
use taskdesk_auth::app::AppState;
use taskdesk_shared::{
    auth::jwt::hash_token,
    models::{login_attempt::LoginAttempt, user::User},
};
use uuid::Uuid;

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_register_then_me() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, body) = ctx
        .send(Method::GET, "/v1/auth/me", Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], user.username);
    assert_eq!(body["email"], user.email);
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_duplicate_registration_conflicts() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, body) = ctx
        .send(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({
                "email": user.email.to_uppercase(),
                "username": format!("{}_2", user.username),
                "password": PASSWORD
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already registered");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_weak_password_rejected() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .send(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({
                "email": "weak@example.com",
                "username": "weakling",
                "password": "password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "password");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_login_by_email_or_username() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, body) = ctx.login(&user.email.to_uppercase(), PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");

    let (status, _) = ctx.login(&user.username, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let attempts = LoginAttempt::list_recent_for_user(&ctx.db, user.id, 10)
        .await
        .unwrap();
    assert_eq!(attempts.iter().filter(|a| a.success).count(), 2);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_unknown_user_and_wrong_password_look_alike() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;
    let since = Utc::now() - Duration::minutes(5);
    let unknown = format!("nobody_{}", &Uuid::new_v4().simple().to_string()[..12]);

    let (wrong_status, wrong_body) = ctx.login(&user.username, "Wr0ng-Password!").await;
    let (unknown_status, unknown_body) = ctx.login(&unknown, PASSWORD).await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["message"], unknown_body["message"]);

    // Both attempts are audited, with the reason kept server-side
    let attempts = LoginAttempt::list_recent_for_user(&ctx.db, user.id, 10)
        .await
        .unwrap();
    let latest = &attempts[0];
    assert!(!latest.success);
    assert_eq!(latest.failure_reason.as_deref(), Some("invalid_password"));
    assert_eq!(latest.ip_address.as_deref(), Some(ctx.ip.as_str()));
    assert_eq!(latest.user_agent.as_deref(), Some("taskdesk-tests"));

    let unknown_failures = LoginAttempt::count_recent_failures(&ctx.db, &unknown, since)
        .await
        .unwrap();
    assert_eq!(unknown_failures, 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_login_lockout_after_repeated_failures() {
    let ctx = TestContext::with_config(test_config(&[("LOGIN_MAX_ATTEMPTS", "3")]))
        .await
        .unwrap();
    let user = ctx.register().await;
    let since = Utc::now() - Duration::minutes(5);

    for _ in 0..3 {
        let (status, _) = ctx.login(&user.username, "Wr0ng-Password!").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Locked before the password is checked, so the right one fails too
    let (status, body) = ctx.login(&user.username, PASSWORD).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limit_exceeded");

    // Three wrong passwords plus the blocked attempt
    let failures = LoginAttempt::count_recent_failures(&ctx.db, &user.username, since)
        .await
        .unwrap();
    assert_eq!(failures, 4);

    let attempts = LoginAttempt::list_recent_for_user(&ctx.db, user.id, 10)
        .await
        .unwrap();
    assert!(attempts.iter().all(|a| !a.success));
    assert_eq!(
        attempts
            .iter()
            .filter(|a| a.failure_reason.as_deref() == Some("invalid_password"))
            .count(),
        3
    );
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_refresh_rotates_and_detects_reuse() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, rotated) = ctx
        .send(
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": user.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"], user.refresh_token.as_str());
    assert_eq!(rotated["session_id"], user.session_id.to_string());

    // Replaying the old token revokes the whole family
    let (status, _) = ctx
        .send(
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": user.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .send(
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": rotated["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let new_access = rotated["access_token"].as_str().unwrap();
    let (status, _) = ctx
        .send(Method::GET, "/v1/auth/me", Some(new_access), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_logout_invalidates_access_token() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, _) = ctx
        .send(Method::POST, "/v1/auth/logout", Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx
        .send(Method::GET, "/v1/auth/me", Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ctx.verify(&user.access_token, SERVICE_KEY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_change_password_keeps_current_session_only() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (_, second) = ctx.login(&user.username, PASSWORD).await;
    let second_access = second["access_token"].as_str().unwrap().to_string();

    let (status, body) = ctx
        .send(
            Method::POST,
            "/v1/auth/change-password",
            Some(&user.access_token),
            Some(json!({
                "current_password": PASSWORD,
                "new_password": "N3w-Password!!"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked_sessions"], 1);

    let (status, _) = ctx
        .send(Method::GET, "/v1/auth/me", Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .send(Method::GET, "/v1/auth/me", Some(&second_access), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.login(&user.username, "N3w-Password!!").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_sessions_listing_and_revocation() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;
    let (_, second) = ctx.login(&user.username, PASSWORD).await;
    let second_session = second["session_id"].as_str().unwrap().to_string();

    let (status, body) = ctx
        .send(Method::GET, "/v1/auth/sessions", Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.iter().filter(|s| s["current"] == true).count(), 1);

    let uri = format!("/v1/auth/sessions/{}", second_session);
    let (status, _) = ctx
        .send(Method::DELETE, &uri, Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx
        .send(Method::DELETE, &uri, Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_update_profile() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, body) = ctx
        .send(
            Method::PATCH,
            "/v1/auth/me",
            Some(&user.access_token),
            Some(json!({ "first_name": null, "last_name": "Lovelace" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["first_name"].is_null());
    assert_eq!(body["last_name"], "Lovelace");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_delete_account_requires_password() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, _) = ctx
        .send(
            Method::DELETE,
            "/v1/auth/me",
            Some(&user.access_token),
            Some(json!({ "password": "Wr0ng-Password!" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = ctx
        .send(
            Method::DELETE,
            "/v1/auth/me",
            Some(&user.access_token),
            Some(json!({ "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.login(&user.username, PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_verify_token_contract() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let (status, _) = ctx
        .verify(&user.access_token, "wrong-service-key-0123456789abcdef")
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ctx.verify(&user.access_token, SERVICE_KEY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert_eq!(body["session_id"], user.session_id.to_string());

    let (status, body) = ctx.verify("not-a-jwt", SERVICE_KEY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body["error"].is_string());

    // Refresh tokens are not accepted as access tokens
    let (_, body) = ctx.verify(&user.refresh_token, SERVICE_KEY).await;
    assert_eq!(body["valid"], false);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_protected_routes_require_bearer() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.send(Method::GET, "/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_health_reports_dependencies() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["redis"], "connected");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_disabled_account_is_forbidden() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    assert!(User::set_active(&ctx.db, user.id, false).await.unwrap());

    let (status, _) = ctx.login(&user.username, PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(Method::GET, "/v1/auth/me", Some(&user.access_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.verify(&user.access_token, SERVICE_KEY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["error"], "Account is disabled");

    assert!(User::set_active(&ctx.db, user.id, true).await.unwrap());
    let (status, _) = ctx.login(&user.email, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_oversized_client_headers_do_not_break_sign_in() {
    let ctx = TestContext::new().await.unwrap();
    let suffix = &Uuid::new_v4().simple().to_string()[..12];
    let username = format!("embedded_{}", suffix);
    let long_agent = format!("Mozilla/5.0 {}", "(KHTML, like Gecko) ".repeat(30));
    let junk_forwarded = "9".repeat(81);
    let headers = [
        ("user-agent", long_agent.as_str()),
        ("x-forwarded-for", junk_forwarded.as_str()),
    ];

    let (status, body) = ctx
        .dispatch(raw_request(
            Method::POST,
            "/v1/auth/register",
            &headers,
            Some(json!({
                "email": format!("{}@example.com", username),
                "username": username,
                "password": PASSWORD
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

    let (status, _) = ctx
        .dispatch(raw_request(
            Method::POST,
            "/v1/auth/refresh",
            &headers,
            Some(json!({ "refresh_token": body["refresh_token"] })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let user_id: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();
    let (agent, ip): (Option<String>, Option<String>) = sqlx::query_as(
        "SELECT user_agent, ip_address FROM user_sessions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    assert_eq!(agent.map(|a| a.len()), Some(512));
    assert_eq!(ip, None);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_forwarded_for_ignored_without_trusted_proxy() {
    let ctx = TestContext::with_config(test_config(&[
        ("TRUST_PROXY_HEADERS", "false"),
        ("AUTH_RATE_LIMIT_PER_MINUTE", "3"),
    ]))
    .await
    .unwrap();

    let bytes = Uuid::new_v4().into_bytes();
    let peer = SocketAddr::from(([10, bytes[0], bytes[1], bytes[2]], 5000));
    let other_peer = SocketAddr::from(([10, bytes[0], bytes[1], bytes[2].wrapping_add(1)], 5000));

    let request_from = |peer: SocketAddr, forwarded: &str| {
        let mut request = raw_request(
            Method::GET,
            "/v1/auth/me",
            &[("x-forwarded-for", forwarded)],
            None,
        );
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    };

    // A new forwarded address per request still counts against the peer
    for n in 1..=3 {
        let (status, _) = ctx.dispatch(request_from(peer, &format!("203.0.113.{}", n))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = ctx.dispatch(request_from(peer, "203.0.113.99")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limit_exceeded");

    let (status, _) = ctx.dispatch(request_from(other_peer, "203.0.113.1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_purge_expired_rotation_chain() {
    let ctx = TestContext::new().await.unwrap();
    let user = ctx.register().await;

    let mut refresh_token = user.refresh_token.clone();
    for _ in 0..2 {
        let (status, body) = ctx
            .send(
                Method::POST,
                "/v1/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh_token })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        refresh_token = body["refresh_token"].as_str().unwrap().to_string();
    }

    let auth = AppState::new(ctx.db.clone(), ctx.redis.clone(), test_config(&[])).auth;
    let cutoff = || Utc::now() - Duration::days(1);

    let user_id = user.id;
    let count = |table: &'static str| {
        let db = ctx.db.clone();
        async move {
            let (n,): (i64,) =
                sqlx::query_as(&format!("SELECT COUNT(*) FROM {} WHERE user_id = $1", table))
                    .bind(user_id)
                    .fetch_one(&db)
                    .await
                    .unwrap();
            n
        }
    };

    // Only the first token of the chain has aged out; it still links to
    // its successor through `replaced_by`
    sqlx::query(
        "UPDATE refresh_tokens SET expires_at = NOW() - INTERVAL '2 days' WHERE token_hash = $1",
    )
    .bind(hash_token(&user.refresh_token))
    .execute(&ctx.db)
    .await
    .unwrap();

    let (_, tokens) = auth.purge_expired(cutoff()).await.unwrap();
    assert!(tokens >= 1);
    assert_eq!(count("refresh_tokens").await, 2);
    assert_eq!(count("user_sessions").await, 1);

    let (status, _) = ctx
        .send(
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Then the whole session expires
    for table in ["refresh_tokens", "user_sessions"] {
        sqlx::query(&format!(
            "UPDATE {} SET expires_at = NOW() - INTERVAL '2 days' WHERE user_id = $1",
            table
        ))
        .bind(user.id)
        .execute(&ctx.db)
        .await
        .unwrap();
    }

    let (sessions, tokens) = auth.purge_expired(cutoff()).await.unwrap();
    assert!(sessions >= 1);
    assert!(tokens >= 3);
    assert_eq!(count("refresh_tokens").await, 0);
    assert_eq!(count("user_sessions").await, 0);
    assert!(User::find_by_id(&ctx.db, user.id).await.unwrap().is_some());
}
