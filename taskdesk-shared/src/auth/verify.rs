/// Wire types for `POST /v1/auth/verify-token`
///
/// The auth service answers with these and the task service decodes them,
/// so both sides share one definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::middleware::AuthContext;

/// Path of the verification endpoint on the auth service
pub const VERIFY_TOKEN_PATH: &str = "/v1/auth/verify-token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Public view of the user behind a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_verified: bool,
}

/// Verification outcome
///
/// `valid=false` is a normal 200 answer carrying the reason in `error`;
/// non-2xx statuses are reserved for problems with the call itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<VerifiedUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyTokenResponse {
    pub fn valid(user: VerifiedUser, session_id: Uuid, expires_at: DateTime<Utc>) -> Self {
        Self {
            valid: true,
            user: Some(user),
            session_id: Some(session_id),
            expires_at: Some(expires_at),
            error: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            user: None,
            session_id: None,
            expires_at: None,
            error: Some(reason.into()),
        }
    }

    /// Converts a positive answer into an `AuthContext`
    ///
    /// Returns `None` for invalid answers and for valid ones missing the
    /// user, session or expiry.
    pub fn into_context(self) -> Option<AuthContext> {
        if !self.valid {
            return None;
        }

        let user = self.user?;
        Some(AuthContext {
            user_id: user.id,
            email: user.email,
            username: user.username,
            session_id: self.session_id?,
            token_id: None,
            expires_at: self.expires_at?,
        })
    }
}
