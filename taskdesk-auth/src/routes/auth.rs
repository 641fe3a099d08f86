/// Authentication endpoints
///
/// This module provides user authentication endpoints:
/// - Registration
/// - Login
/// - Token refresh
/// - Logout (current session or everywhere)
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Rotate the refresh token
/// - `POST /v1/auth/logout` - End the current session
/// - `POST /v1/auth/logout-all` - End every session

use crate::{
    app::AppState,
    service::{AuthTokens, Registration},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskdesk_shared::{
    auth::middleware::{AuthContext, ClientInfo},
    error::{validate_request, ApiError, ApiResult},
    models::user::{is_valid_username, User},
};
use uuid::Uuid;
use validator::Validate;

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar_url: user.avatar_url,
            is_verified: user.is_verified,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Register and login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,

    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    /// Password (validated for strength)
    pub password: String,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    /// Label shown in the session list
    #[validate(length(max = 100, message = "Device name must be at most 100 characters"))]
    pub device_name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address or username
    #[validate(length(min = 1, max = 255, message = "Email or username is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(length(max = 100, message = "Device name must be at most 100 characters"))]
    pub device_name: Option<String>,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout-all response
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutAllResponse {
    /// Number of sessions that were ended
    pub revoked_sessions: usize,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "username": "ada",
///   "password": "SecureP@ss123",
///   "first_name": "Ada"
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "user": { "id": "uuid", "email": "ada@example.com", "username": "ada", ... },
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "token_type": "Bearer",
///   "expires_in": 900,
///   "session_id": "uuid"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email or username already taken
/// - `422 Unprocessable Entity`: Validation failed or weak password
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validate_request(&req)?;

    if !is_valid_username(req.username.trim()) {
        return Err(ApiError::invalid_field(
            "username",
            "Username may only contain letters, digits, '_', '.' and '-'",
        ));
    }

    let registration = Registration {
        email: req.email,
        username: req.username,
        password: req.password,
        first_name: req.first_name,
        last_name: req.last_name,
        device_name: req.device_name,
    };
    let (user, tokens) = state.auth.register(registration, &client).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.into(),
            tokens,
        }),
    ))
}

/// Login with email or username
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown user or wrong password (same message)
/// - `403 Forbidden`: Account disabled
/// - `429 Too Many Requests`: Too many failed attempts for this identifier or IP
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    validate_request(&req)?;

    let (user, tokens) = state
        .auth
        .login(&req.identifier, &req.password, &client, req.device_name)
        .await?;

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// Rotate a refresh token
///
/// The presented token stops working; presenting it again revokes every
/// session of the user.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired, revoked or reused token
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AuthTokens>> {
    let tokens = state.auth.refresh(&req.refresh_token, &client).await?;
    Ok(Json(tokens))
}

/// End the current session
///
/// Returns 204. The access token used for the call stops verifying at once.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    state.auth.logout(&auth).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// End every session of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<LogoutAllResponse>> {
    let revoked_sessions = state.auth.logout_all(&auth).await?;
    Ok(Json(LogoutAllResponse { revoked_sessions }))
}
