/// Request-side authentication helpers shared by both services
///
/// Each service installs its own gate (the auth service checks tokens
/// locally, the task service asks the auth service), but both end the same
/// way: an [`AuthContext`] is inserted into the request extensions and
/// handlers pull it out with `Extension<AuthContext>`.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use taskdesk_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.username)
/// }
/// ```

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};
use uuid::Uuid;

use crate::error::ApiError;

/// Authenticated caller, attached to request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// User email at verification time
    pub email: String,

    /// Username at verification time
    pub username: String,

    /// Session the access token belongs to
    pub session_id: Uuid,

    /// Access token ID (`jti`), when known
    pub token_id: Option<Uuid>,

    /// Access token expiry
    pub expires_at: DateTime<Utc>,
}

/// Error type for authentication gates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat(String),

    /// Token rejected
    InvalidToken(String),

    /// `X-Service-Key` missing or wrong
    InvalidServiceKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Extracts the bearer token from the `Authorization` header
///
/// The scheme is matched case-insensitively; an empty token is a format
/// error rather than a missing credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Malformed authorization header".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidFormat("Expected Bearer token".to_string()));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Empty bearer token".to_string()));
    }

    Ok(token)
}

/// Longest user agent kept, matching the `user_agent` columns
pub const MAX_USER_AGENT_LEN: usize = 512;

/// Whether `X-Forwarded-For` and `X-Real-IP` may name the client
///
/// Installed as a request extension by services that sit behind a reverse
/// proxy. Without it only the socket address is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustProxyHeaders(pub bool);

/// Caller network metadata used for auditing and rate limiting
///
/// With [`TrustProxyHeaders`] enabled the IP is taken from
/// `X-Forwarded-For` (first hop), then `X-Real-IP`. Otherwise, and when
/// neither header holds a valid address, the socket address from connect
/// info is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_parts(parts: &Parts) -> Self {
        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let trust_proxy = parts
            .extensions
            .get::<TrustProxyHeaders>()
            .is_some_and(|TrustProxyHeaders(trusted)| *trusted);

        let proxied = trust_proxy
            .then(|| {
                header_str("x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .and_then(parse_ip)
                    .or_else(|| header_str("x-real-ip").and_then(parse_ip))
            })
            .flatten();

        let ip_address = proxied
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .map(|ip| ip.to_string());

        Self {
            ip_address,
            user_agent: header_str(header::USER_AGENT.as_str())
                .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect()),
        }
    }

    /// Key used when an IP is unknown
    pub fn ip_or_unknown(&self) -> &str {
        self.ip_address.as_deref().unwrap_or("unknown")
    }
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse().ok()
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_parts(parts))
    }
}
