/// Session management endpoints
///
/// - `GET /v1/auth/sessions` - List the caller's active sessions
/// - `DELETE /v1/auth/sessions/:id` - Revoke one of them

use crate::app::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskdesk_shared::{
    auth::middleware::AuthContext,
    error::ApiResult,
    models::session::UserSession,
};
use uuid::Uuid;

/// One active session
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Whether this is the session of the calling token
    pub current: bool,
}

impl SessionResponse {
    fn new(session: UserSession, current_session: Uuid) -> Self {
        Self {
            current: session.id == current_session,
            id: session.id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            created_at: session.created_at,
            last_active_at: session.last_active_at,
            expires_at: session.expires_at,
        }
    }
}

/// Session list response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SessionListResponse>> {
    let sessions = UserSession::list_active_for_user(&state.db, auth.user_id)
        .await?
        .into_iter()
        .map(|session| SessionResponse::new(session, auth.session_id))
        .collect();

    Ok(Json(SessionListResponse { sessions }))
}

/// Revokes a session of the caller
///
/// # Errors
///
/// - `404 Not Found`: No such active session for this user
pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.auth.revoke_session(&auth, session_id).await?;
    tracing::info!(user_id = %auth.user_id, session_id = %session_id, "Session revoked");
    Ok(StatusCode::NO_CONTENT)
}
