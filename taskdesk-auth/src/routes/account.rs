/// Account endpoints for the authenticated user
///
/// - `GET /v1/auth/me` - Profile
/// - `PATCH /v1/auth/me` - Update profile fields or username
/// - `DELETE /v1/auth/me` - Delete the account (password confirmation)
/// - `POST /v1/auth/change-password` - Replace the password

use crate::{app::AppState, routes::auth::UserResponse};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskdesk_shared::{
    auth::middleware::AuthContext,
    error::{validate_request, ApiError, ApiResult},
    models::{
        deserialize_some,
        user::{is_valid_username, UpdateProfile, User},
    },
};
use validator::Validate;

/// Profile update request
///
/// Omitted fields are left unchanged; `null` clears a nullable field.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub first_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub last_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub avatar_url: Option<Option<String>>,
}

impl UpdateProfileRequest {
    fn into_update(self) -> ApiResult<UpdateProfile> {
        if let Some(username) = &self.username {
            if !is_valid_username(username.trim()) {
                return Err(ApiError::invalid_field(
                    "username",
                    "Username may only contain letters, digits, '_', '.' and '-'",
                ));
            }
        }

        let too_long = |value: &Option<Option<String>>, max: usize| {
            matches!(value, Some(Some(text)) if text.chars().count() > max)
        };
        if too_long(&self.first_name, 100) {
            return Err(ApiError::invalid_field(
                "first_name",
                "First name must be at most 100 characters",
            ));
        }
        if too_long(&self.last_name, 100) {
            return Err(ApiError::invalid_field(
                "last_name",
                "Last name must be at most 100 characters",
            ));
        }
        if too_long(&self.avatar_url, 512) {
            return Err(ApiError::invalid_field(
                "avatar_url",
                "Avatar URL must be at most 512 characters",
            ));
        }

        Ok(UpdateProfile {
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar_url: self.avatar_url,
        })
    }
}

/// Password change request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    pub new_password: String,
}

/// Password change response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordResponse {
    /// Sessions other than the current one that were ended
    pub revoked_sessions: usize,
}

/// Account deletion request
#[derive(Debug, Deserialize, Validate)]
pub struct DeleteAccountRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Returns the caller's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserResponse>> {
    let user = state.auth.require_user(auth.user_id).await?;
    Ok(Json(user.into()))
}

/// Updates the caller's profile
///
/// # Errors
///
/// - `409 Conflict`: Username already taken
/// - `422 Unprocessable Entity`: Invalid field
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    validate_request(&req)?;
    let update = req.into_update()?;

    if update.is_empty() {
        let user = state.auth.require_user(auth.user_id).await?;
        return Ok(Json(user.into()));
    }

    let user = User::update_profile(&state.db, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(Json(user.into()))
}

/// Changes the caller's password
///
/// Every other session is ended; the current one stays valid.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Wrong current password, weak or unchanged new password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<ChangePasswordResponse>> {
    validate_request(&req)?;

    let revoked_sessions = state
        .auth
        .change_password(&auth, &req.current_password, &req.new_password)
        .await?;

    Ok(Json(ChangePasswordResponse { revoked_sessions }))
}

/// Deletes the caller's account with its sessions and tokens
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<StatusCode> {
    validate_request(&req)?;
    state.auth.delete_account(&auth, &req.password).await?;
    Ok(StatusCode::NO_CONTENT)
}
