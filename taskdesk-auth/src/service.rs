/// Authentication business logic
///
/// `AuthService` owns the session lifecycle: it opens sessions on register
/// and login, rotates refresh tokens, verifies access tokens and revokes
/// sessions. Route handlers only parse requests and shape responses.
///
/// # Session model
///
/// ```text
/// login ──> user_sessions row ──> access JWT (sid, jti)   15 min
///                             └─> refresh JWT (sid)       7 days, stored hashed
///
/// refresh ──> old refresh token revoked + replaced_by ──> new pair, same session
/// reuse of a rotated token ──> every session of the user revoked
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use taskdesk_shared::{
    auth::{
        jwt::{hash_token, JwtError, TokenService},
        middleware::{AuthContext, ClientInfo},
        password::{hash_password, validate_password_strength, verify_password},
    },
    error::{ApiError, ApiResult},
    models::{
        login_attempt::{LoginAttempt, LoginFailure, NewLoginAttempt},
        refresh_token::{CreateRefreshToken, RefreshToken},
        session::{CreateSession, UserSession},
        user::{normalize_email, CreateUser, User},
    },
    redis::{RateLimitDecision, RateLimiter, RedisClientError, SessionCache},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LimitsConfig;

/// Message for unknown users and wrong passwords alike
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Tokens handed to the client after register, login or refresh
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub session_id: Uuid,
}

/// Input for creating an account
#[derive(Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    /// Plaintext password, hashed before it is stored
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub device_name: Option<String>,
}

/// A verified access token together with its user
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub context: AuthContext,
    pub user: User,
}

/// Why an access token was not accepted
#[derive(Debug, thiserror::Error)]
pub enum TokenRejection {
    #[error("{0}")]
    Invalid(String),

    #[error("Token has been revoked")]
    Revoked,

    #[error("Session has been revoked or expired")]
    SessionInactive,

    #[error("User not found")]
    UnknownUser,

    #[error("Account is disabled")]
    AccountDisabled,

    /// Redis or the database failed; the token could not be checked
    #[error("Token verification unavailable: {0}")]
    Unavailable(String),
}

impl From<JwtError> for TokenRejection {
    fn from(err: JwtError) -> Self {
        let message = match err {
            JwtError::Expired => "Token expired".to_string(),
            JwtError::InvalidIssuer { .. } => "Invalid token issuer".to_string(),
            JwtError::WrongType { .. } => "Not an access token".to_string(),
            other => format!("Invalid token: {}", other),
        };
        TokenRejection::Invalid(message)
    }
}

impl From<TokenRejection> for ApiError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::AccountDisabled => ApiError::Forbidden(rejection.to_string()),
            TokenRejection::Unavailable(reason) => {
                warn!(reason = %reason, "Token verification backend failed");
                ApiError::ServiceUnavailable("Authentication is temporarily unavailable".to_string())
            }
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

fn login_identifier_key(identifier: &str) -> String {
    format!("login:id:{}", identifier.trim().to_lowercase())
}

fn login_ip_key(ip: &str) -> String {
    format!("login:ip:{}", ip)
}

/// The stricter of two limiter decisions
fn combine(a: RateLimitDecision, b: RateLimitDecision) -> RateLimitDecision {
    match (a.allowed, b.allowed) {
        (true, true) => a,
        (false, true) => a,
        (true, false) => b,
        (false, false) if a.retry_after >= b.retry_after => a,
        (false, false) => b,
    }
}

/// Authentication operations over the auth database and Redis
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    tokens: Arc<TokenService>,
    sessions: SessionCache,
    limiter: RateLimiter,
    limits: LimitsConfig,
}

impl AuthService {
    pub fn new(
        db: PgPool,
        tokens: Arc<TokenService>,
        sessions: SessionCache,
        limiter: RateLimiter,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            db,
            tokens,
            sessions,
            limiter,
            limits,
        }
    }

    /// Creates an account and logs it in
    ///
    /// # Errors
    ///
    /// - 422 if the password is too weak
    /// - 409 if the email or username is taken
    pub async fn register(
        &self,
        registration: Registration,
        client: &ClientInfo,
    ) -> ApiResult<(User, AuthTokens)> {
        validate_password_strength(&registration.password)
            .map_err(|message| ApiError::invalid_field("password", message))?;

        let data = CreateUser {
            email: normalize_email(&registration.email),
            username: registration.username.trim().to_string(),
            password_hash: hash_password(&registration.password)?,
            first_name: registration.first_name,
            last_name: registration.last_name,
        };

        let mut tx = self.db.begin().await?;
        let user = User::create(&mut *tx, data).await?;
        let tokens = self
            .open_session(&mut tx, &user, client, registration.device_name)
            .await?;
        tx.commit().await?;

        self.cache_session(tokens.session_id, user.id).await;
        info!(user_id = %user.id, "User registered");

        Ok((user, tokens))
    }

    /// Logs in with an email or username
    ///
    /// The lockout check runs before the password is looked at, so a locked
    /// identifier cannot be probed further.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
        device_name: Option<String>,
    ) -> ApiResult<(User, AuthTokens)> {
        let identifier_key = login_identifier_key(identifier);
        let ip_key = login_ip_key(client.ip_or_unknown());

        let by_identifier = self
            .limiter
            .peek(&identifier_key, self.limits.login_max_attempts)
            .await?;
        let by_ip = self
            .limiter
            .peek(&ip_key, self.limits.login_ip_max_attempts)
            .await?;
        let decision = combine(by_identifier, by_ip);

        if !decision.allowed {
            self.record_attempt(identifier, None, client, Some(LoginFailure::RateLimited))
                .await;
            warn!(ip = %client.ip_or_unknown(), "Login blocked by attempt limit");
            return Err(ApiError::RateLimitExceeded {
                retry_after: decision.retry_after,
                message: format!(
                    "Too many failed login attempts. Try again in {} seconds",
                    decision.retry_after
                ),
            });
        }

        let user = match User::find_by_identifier(&self.db, identifier).await? {
            Some(user) => user,
            None => {
                self.login_failed(identifier, None, client, LoginFailure::UnknownUser)
                    .await;
                return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(password, &user.password_hash)? {
            self.login_failed(identifier, Some(user.id), client, LoginFailure::InvalidPassword)
                .await;
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active {
            self.record_attempt(identifier, Some(user.id), client, Some(LoginFailure::AccountDisabled))
                .await;
            return Err(ApiError::Forbidden("Account is disabled".to_string()));
        }

        if let Err(e) = self.limiter.reset(&identifier_key).await {
            warn!(error = %e, "Failed to reset login attempt counter");
        }
        self.record_attempt(identifier, Some(user.id), client, None).await;
        User::update_last_login(&self.db, user.id).await?;

        let mut tx = self.db.begin().await?;
        let tokens = self.open_session(&mut tx, &user, client, device_name).await?;
        tx.commit().await?;

        self.cache_session(tokens.session_id, user.id).await;
        info!(user_id = %user.id, session_id = %tokens.session_id, "User logged in");

        Ok((user, tokens))
    }

    /// Exchanges a refresh token for a new pair
    ///
    /// The presented token is revoked and linked to its successor in the
    /// same transaction that stores the successor.
    pub async fn refresh(&self, refresh_token: &str, client: &ClientInfo) -> ApiResult<AuthTokens> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(|_| ApiError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()))?;

        let mut tx = self.db.begin().await?;

        let stored = RefreshToken::find_by_hash(&mut *tx, &hash_token(refresh_token))
            .await?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()))?;

        if stored.was_rotated() {
            let revoked = UserSession::revoke_all_for_user(&mut *tx, stored.user_id, None).await?;
            RefreshToken::revoke_all_for_user(&mut *tx, stored.user_id, None).await?;
            tx.commit().await?;

            self.evict_sessions(&revoked).await;
            warn!(
                user_id = %stored.user_id,
                revoked_sessions = revoked.len(),
                "Refresh token reuse detected, all sessions revoked"
            );
            return Err(ApiError::Unauthorized(
                "Refresh token reuse detected; all sessions have been revoked".to_string(),
            ));
        }

        if !stored.is_usable() || stored.session_id != claims.sid || stored.user_id != claims.sub {
            return Err(ApiError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()));
        }

        let session = UserSession::find_active(&mut *tx, stored.session_id)
            .await?
            .ok_or_else(|| {
                ApiError::Unauthorized("Session has been revoked or expired".to_string())
            })?;

        let user = User::find_by_id(&mut *tx, stored.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()))?;
        if !user.is_active {
            return Err(ApiError::Forbidden("Account is disabled".to_string()));
        }

        let pair = self.tokens.issue_pair(user.id, session.id)?;
        let successor = RefreshToken::create(
            &mut *tx,
            CreateRefreshToken {
                user_id: user.id,
                session_id: session.id,
                token_hash: hash_token(&pair.refresh_token),
                expires_at: pair.refresh_claims.expires_at(),
                device_name: stored.device_name.clone(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            },
        )
        .await?;

        if !RefreshToken::rotate(&mut *tx, stored.id, successor.id).await? {
            // Lost a race with a concurrent refresh; dropping tx rolls back
            return Err(ApiError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()));
        }
        UserSession::touch(&mut *tx, session.id).await?;
        tx.commit().await?;

        Ok(AuthTokens {
            expires_in: pair.expires_in(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            session_id: session.id,
        })
    }

    /// Verifies an access token down to the user row
    ///
    /// Checks, in order: signature and claims, the revoked-token list, the
    /// session (cache first, database on a miss) and finally the user.
    pub async fn authenticate(&self, token: &str) -> Result<Authenticated, TokenRejection> {
        let claims = self.tokens.verify_access(token)?;

        let revoked = self
            .sessions
            .is_token_revoked(claims.jti)
            .await
            .map_err(|e| TokenRejection::Unavailable(e.to_string()))?;
        if revoked {
            return Err(TokenRejection::Revoked);
        }

        self.ensure_session_active(claims.sid, claims.sub).await?;

        let user = User::find_by_id(&self.db, claims.sub)
            .await
            .map_err(|e| TokenRejection::Unavailable(e.to_string()))?
            .ok_or(TokenRejection::UnknownUser)?;
        if !user.is_active {
            return Err(TokenRejection::AccountDisabled);
        }

        Ok(Authenticated {
            context: AuthContext {
                user_id: user.id,
                email: user.email.clone(),
                username: user.username.clone(),
                session_id: claims.sid,
                token_id: Some(claims.jti),
                expires_at: claims.expires_at(),
            },
            user,
        })
    }

    async fn ensure_session_active(&self, session_id: Uuid, user_id: Uuid) -> Result<(), TokenRejection> {
        match self.sessions.cached_session(session_id).await {
            Ok(Some(owner)) if owner == user_id => return Ok(()),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Session cache read failed, using database"),
        }

        let session = UserSession::find_active(&self.db, session_id)
            .await
            .map_err(|e| TokenRejection::Unavailable(e.to_string()))?
            .filter(|session| session.user_id == user_id)
            .ok_or(TokenRejection::SessionInactive)?;

        if let Err(e) = self
            .sessions
            .cache_session(session.id, session.user_id, session.remaining_seconds())
            .await
        {
            warn!(error = %e, "Failed to repopulate session cache");
        }

        Ok(())
    }

    /// Ends the caller's session
    pub async fn logout(&self, auth: &AuthContext) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        UserSession::revoke(&mut *tx, auth.session_id, auth.user_id).await?;
        RefreshToken::revoke_for_session(&mut *tx, auth.session_id).await?;
        tx.commit().await?;

        self.evict_sessions(&[auth.session_id]).await;
        self.deny_access_token(auth).await?;

        info!(user_id = %auth.user_id, session_id = %auth.session_id, "User logged out");
        Ok(())
    }

    /// Ends every session of the caller; returns how many were open
    pub async fn logout_all(&self, auth: &AuthContext) -> ApiResult<usize> {
        let mut tx = self.db.begin().await?;
        let revoked = UserSession::revoke_all_for_user(&mut *tx, auth.user_id, None).await?;
        RefreshToken::revoke_all_for_user(&mut *tx, auth.user_id, None).await?;
        tx.commit().await?;

        self.evict_sessions(&revoked).await;
        self.deny_access_token(auth).await?;

        info!(user_id = %auth.user_id, sessions = revoked.len(), "User logged out everywhere");
        Ok(revoked.len())
    }

    /// Revokes one of the caller's sessions
    pub async fn revoke_session(&self, auth: &AuthContext, session_id: Uuid) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        if !UserSession::revoke(&mut *tx, session_id, auth.user_id).await? {
            return Err(ApiError::NotFound("Session not found".to_string()));
        }
        RefreshToken::revoke_for_session(&mut *tx, session_id).await?;
        tx.commit().await?;

        self.evict_sessions(&[session_id]).await;
        if session_id == auth.session_id {
            self.deny_access_token(auth).await?;
        }

        Ok(())
    }

    /// Replaces the password and ends every other session
    ///
    /// Returns the number of sessions revoked.
    pub async fn change_password(
        &self,
        auth: &AuthContext,
        current_password: &str,
        new_password: &str,
    ) -> ApiResult<usize> {
        let user = self.require_user(auth.user_id).await?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(ApiError::invalid_field(
                "current_password",
                "Current password is incorrect",
            ));
        }
        if current_password == new_password {
            return Err(ApiError::invalid_field(
                "new_password",
                "New password must differ from the current password",
            ));
        }
        validate_password_strength(new_password)
            .map_err(|message| ApiError::invalid_field("new_password", message))?;

        let password_hash = hash_password(new_password)?;

        let mut tx = self.db.begin().await?;
        User::update_password(&mut *tx, user.id, &password_hash).await?;
        let revoked =
            UserSession::revoke_all_for_user(&mut *tx, user.id, Some(auth.session_id)).await?;
        RefreshToken::revoke_all_for_user(&mut *tx, user.id, Some(auth.session_id)).await?;
        tx.commit().await?;

        self.evict_sessions(&revoked).await;
        info!(user_id = %user.id, revoked_sessions = revoked.len(), "Password changed");

        Ok(revoked.len())
    }

    /// Deletes the caller's account after confirming the password
    pub async fn delete_account(&self, auth: &AuthContext, password: &str) -> ApiResult<()> {
        let user = self.require_user(auth.user_id).await?;

        if !verify_password(password, &user.password_hash)? {
            return Err(ApiError::invalid_field("password", "Password is incorrect"));
        }

        let sessions: Vec<Uuid> = UserSession::list_active_for_user(&self.db, user.id)
            .await?
            .into_iter()
            .map(|session| session.id)
            .collect();

        if !User::delete_with_dependents(&self.db, user.id).await? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        self.evict_sessions(&sessions).await;
        self.deny_access_token(auth).await?;

        info!(user_id = %user.id, "Account deleted");
        Ok(())
    }

    /// Deletes sessions and refresh tokens that expired before `older_than`
    ///
    /// Returns `(sessions, refresh_tokens)` removed.
    pub async fn purge_expired(&self, older_than: DateTime<Utc>) -> ApiResult<(u64, u64)> {
        let tokens = RefreshToken::delete_expired(&self.db, older_than).await?;
        let sessions = UserSession::delete_expired(&self.db, older_than).await?;
        Ok((sessions, tokens))
    }

    /// Loads the caller's user row
    pub async fn require_user(&self, user_id: Uuid) -> ApiResult<User> {
        User::find_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    async fn open_session(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
        client: &ClientInfo,
        device_name: Option<String>,
    ) -> ApiResult<AuthTokens> {
        let session = UserSession::create(
            &mut **tx,
            CreateSession {
                user_id: user.id,
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
                expires_at: Utc::now() + self.tokens.refresh_ttl(),
            },
        )
        .await?;

        let pair = self.tokens.issue_pair(user.id, session.id)?;

        RefreshToken::create(
            &mut **tx,
            CreateRefreshToken {
                user_id: user.id,
                session_id: session.id,
                token_hash: hash_token(&pair.refresh_token),
                expires_at: pair.refresh_claims.expires_at(),
                device_name,
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            },
        )
        .await?;

        Ok(AuthTokens {
            expires_in: pair.expires_in(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            session_id: session.id,
        })
    }

    async fn cache_session(&self, session_id: Uuid, user_id: Uuid) {
        let ttl = self.tokens.refresh_ttl().num_seconds().max(0) as u64;
        if let Err(e) = self.sessions.cache_session(session_id, user_id, ttl).await {
            warn!(error = %e, "Failed to cache session");
        }
    }

    async fn evict_sessions(&self, session_ids: &[Uuid]) {
        if let Err(e) = self.sessions.evict_sessions(session_ids).await {
            // A stale entry keeps its session usable until the entry's TTL runs out
            warn!(error = %e, sessions = session_ids.len(), "Failed to evict cached sessions");
        }
    }

    async fn deny_access_token(&self, auth: &AuthContext) -> Result<(), RedisClientError> {
        let Some(jti) = auth.token_id else {
            return Ok(());
        };
        let remaining = (auth.expires_at - Utc::now()).num_seconds().max(0) as u64;
        self.sessions.revoke_token(jti, remaining).await
    }

    async fn login_failed(
        &self,
        identifier: &str,
        user_id: Option<Uuid>,
        client: &ClientInfo,
        failure: LoginFailure,
    ) {
        let window = self.limits.login_window_secs;
        let keys = [
            (login_identifier_key(identifier), self.limits.login_max_attempts),
            (login_ip_key(client.ip_or_unknown()), self.limits.login_ip_max_attempts),
        ];
        for (key, limit) in keys {
            if let Err(e) = self.limiter.hit(&key, limit, window).await {
                warn!(error = %e, "Failed to count login failure");
            }
        }

        self.record_attempt(identifier, user_id, client, Some(failure)).await;
    }

    async fn record_attempt(
        &self,
        identifier: &str,
        user_id: Option<Uuid>,
        client: &ClientInfo,
        failure: Option<LoginFailure>,
    ) {
        let attempt = NewLoginAttempt {
            identifier: identifier.trim().to_string(),
            user_id,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            failure,
        };
        if let Err(e) = LoginAttempt::record(&self.db, attempt).await {
            warn!(error = %e, "Failed to record login attempt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(allowed: bool, retry_after: u64) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            count: 0,
            remaining: 0,
            retry_after,
        }
    }

    #[test]
    fn test_limiter_keys() {
        assert_eq!(login_identifier_key("  Ada@Example.com "), "login:id:ada@example.com");
        assert_eq!(login_ip_key("203.0.113.7"), "login:ip:203.0.113.7");
    }

    #[test]
    fn test_combine_prefers_blocking_decision() {
        assert!(combine(decision(true, 0), decision(true, 0)).allowed);
        assert_eq!(combine(decision(false, 30), decision(true, 0)).retry_after, 30);
        assert_eq!(combine(decision(true, 0), decision(false, 45)).retry_after, 45);
        assert_eq!(combine(decision(false, 30), decision(false, 45)).retry_after, 45);
    }

    #[test]
    fn test_jwt_errors_become_readable_rejections() {
        assert_eq!(
            TokenRejection::from(JwtError::Expired).to_string(),
            "Token expired"
        );
        assert_eq!(
            TokenRejection::from(JwtError::WrongType {
                expected: "access",
                actual: "refresh"
            })
            .to_string(),
            "Not an access token"
        );
    }

    #[test]
    fn test_rejection_status_mapping() {
        use axum::http::StatusCode;

        assert_eq!(ApiError::from(TokenRejection::Revoked).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(TokenRejection::AccountDisabled).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(TokenRejection::Unavailable("redis down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
