/// Client for the auth service's token verification endpoint
///
/// Every authenticated request to the task service is checked by calling
/// `POST {AUTH_SERVICE_URL}/v1/auth/verify-token` with the shared service
/// key. There is no local JWT validation and no caching: a token revoked on
/// the auth service stops working here on the next request.
///
/// Failures are not retried. A call that cannot reach the auth service
/// fails the request with 503.

use async_trait::async_trait;
use reqwest::StatusCode;
use taskdesk_shared::{
    auth::{
        middleware::AuthContext,
        service_key::SERVICE_KEY_HEADER,
        verify::{VerifyTokenRequest, VerifyTokenResponse, VERIFY_TOKEN_PATH},
    },
    error::ApiError,
};

use crate::config::AuthServiceConfig;

/// Why a token could not be verified
#[derive(Debug, thiserror::Error)]
pub enum AuthClientError {
    /// The auth service answered `valid: false`
    #[error("{0}")]
    Rejected(String),

    /// The auth service answered with a non-2xx status
    #[error("Auth service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Connection refused, DNS failure or timeout
    #[error("Authentication service unreachable")]
    Unreachable,
}

impl From<AuthClientError> for ApiError {
    fn from(err: AuthClientError) -> Self {
        match err {
            AuthClientError::Rejected(reason) => ApiError::Unauthorized(reason),
            AuthClientError::Upstream { status, message } => {
                tracing::warn!(status, message = %message, "Auth service call failed");
                // Upstream errors describe this service's call, not the
                // caller's token; only throttling is passed through
                match status {
                    429 => ApiError::RateLimitExceeded {
                        retry_after: 1,
                        message,
                    },
                    _ => ApiError::ServiceUnavailable(message),
                }
            }
            AuthClientError::Unreachable => {
                ApiError::ServiceUnavailable(AuthClientError::Unreachable.to_string())
            }
        }
    }
}

/// Human-readable message for a failed verify-token call
pub fn upstream_message(status: u16) -> &'static str {
    match status {
        400 => "Invalid request to authentication service",
        401 => "Service authentication failed",
        403 => "Access denied by authentication service",
        404 => "Authentication endpoint not found",
        409 => "Conflict reported by authentication service",
        422 => "Authentication service rejected the request data",
        429 => "Authentication service is rate limiting requests",
        500 => "Authentication service internal error",
        503 => "Authentication service unavailable",
        _ => "Unexpected response from authentication service",
    }
}

/// Turns a bearer token into an `AuthContext`
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthContext, AuthClientError>;

    /// Whether the auth service answers at all
    async fn is_reachable(&self) -> bool;
}

/// `TokenVerifier` over HTTP
#[derive(Clone)]
pub struct AuthServiceClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl AuthServiceClient {
    pub fn new(config: &AuthServiceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn verify_url(&self) -> String {
        format!("{}{}", self.base_url, VERIFY_TOKEN_PATH)
    }
}

impl std::fmt::Debug for AuthServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthServiceClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Maps a transport error; anything that is not a bad body counts as unreachable
fn transport_error(err: reqwest::Error) -> AuthClientError {
    if err.is_decode() {
        AuthClientError::Upstream {
            status: 502,
            message: "Malformed response from authentication service".to_string(),
        }
    } else {
        tracing::warn!(error = %err, "Auth service request failed");
        AuthClientError::Unreachable
    }
}

#[async_trait]
impl TokenVerifier for AuthServiceClient {
    async fn verify(&self, token: &str) -> Result<AuthContext, AuthClientError> {
        let response = self
            .http
            .post(self.verify_url())
            .header(SERVICE_KEY_HEADER, &self.service_key)
            .json(&VerifyTokenRequest {
                token: token.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthClientError::Upstream {
                status: status.as_u16(),
                message: upstream_message(status.as_u16()).to_string(),
            });
        }

        let body: VerifyTokenResponse = response.json().await.map_err(transport_error)?;
        if !body.valid {
            return Err(AuthClientError::Rejected(
                body.error.unwrap_or_else(|| "Invalid token".to_string()),
            ));
        }

        body.into_context().ok_or_else(|| AuthClientError::Upstream {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            message: "Incomplete verification response".to_string(),
        })
    }

    async fn is_reachable(&self) -> bool {
        match self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
