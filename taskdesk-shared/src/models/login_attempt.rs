/// Login attempt audit trail
///
/// One row per login attempt, successful or not. Rows outlive the account
/// (`user_id` is set to NULL on delete).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Why a login attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailure {
    UnknownUser,
    InvalidPassword,
    AccountDisabled,
    RateLimited,
}

impl LoginFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginFailure::UnknownUser => "unknown_user",
            LoginFailure::InvalidPassword => "invalid_password",
            LoginFailure::AccountDisabled => "account_disabled",
            LoginFailure::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoginAttempt {
    pub id: Uuid,

    /// Email or username exactly as typed
    pub identifier: String,

    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub identifier: String,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub failure: Option<LoginFailure>,
}

impl LoginAttempt {
    /// Writes an audit row
    pub async fn record(pool: &PgPool, attempt: NewLoginAttempt) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts
                (identifier, user_id, ip_address, user_agent, success, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(attempt.identifier)
        .bind(attempt.user_id)
        .bind(attempt.ip_address)
        .bind(attempt.user_agent)
        .bind(attempt.failure.is_none())
        .bind(attempt.failure.map(|f| f.as_str()))
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Failed attempts for an identifier since `since`
    pub async fn count_recent_failures(
        pool: &PgPool,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM login_attempts
            WHERE identifier = $1 AND success = false AND created_at >= $2
            "#,
        )
        .bind(identifier)
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Most recent attempts against an account
    pub async fn list_recent_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let attempts = sqlx::query_as::<_, LoginAttempt>(
            r#"
            SELECT id, identifier, user_id, ip_address, user_agent, success,
                   failure_reason, created_at
            FROM login_attempts
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(attempts)
    }
}
