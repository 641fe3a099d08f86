/// Server-side login sessions
///
/// Every login or registration opens a session. Access and refresh tokens
/// carry its id in the `sid` claim, so revoking the session invalidates both
/// regardless of their own expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const SESSION_COLUMNS: &str =
    "id, user_id, ip_address, user_agent, expires_at, last_active_at, revoked_at, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSession {
    pub id: Uuid,

    /// Owner of the session
    pub user_id: Uuid,

    /// Client IP at login
    pub ip_address: Option<String>,

    /// Client user agent at login
    pub user_agent: Option<String>,

    /// Hard expiry (matches the refresh token lifetime)
    pub expires_at: DateTime<Utc>,

    /// Last time a token of this session was refreshed
    pub last_active_at: DateTime<Utc>,

    /// Set on logout, password change or refresh-token reuse
    pub revoked_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

/// Input for opening a session
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    /// Active = not revoked and not expired
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }

    /// Seconds left before the session expires (0 once expired)
    pub fn remaining_seconds(&self) -> u64 {
        (self.expires_at - Utc::now()).num_seconds().max(0) as u64
    }

    pub async fn create<'e, E>(executor: E, data: CreateSession) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let session = sqlx::query_as::<_, UserSession>(&format!(
            r#"
            INSERT INTO user_sessions (user_id, ip_address, user_agent, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.ip_address)
        .bind(data.user_agent)
        .bind(data.expires_at)
        .fetch_one(executor)
        .await?;

        Ok(session)
    }

    /// Finds a session only if it is still active
    pub async fn find_active<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let session = sqlx::query_as::<_, UserSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM user_sessions
            WHERE id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    /// Bumps `last_active_at`
    pub async fn touch<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE user_sessions SET last_active_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes one session of a user
    ///
    /// Returns false if the session does not exist, belongs to someone else
    /// or was already revoked.
    pub async fn revoke<'e, E>(executor: E, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET revoked_at = NOW()
            WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every open session of a user, optionally sparing one
    ///
    /// Returns the ids of the sessions that were revoked.
    pub async fn revoke_all_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE user_sessions
            SET revoked_at = NOW()
            WHERE user_id = $1
              AND revoked_at IS NULL
              AND ($2::uuid IS NULL OR id <> $2)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(except)
        .fetch_all(executor)
        .await?;

        Ok(ids)
    }

    /// Lists active sessions, most recently used first
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sessions = sqlx::query_as::<_, UserSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM user_sessions
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            ORDER BY last_active_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(sessions)
    }

    /// Purges sessions that expired before `older_than`
    ///
    /// Refresh tokens of those sessions are removed first.
    pub async fn delete_expired(pool: &PgPool, older_than: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE session_id IN (SELECT id FROM user_sessions WHERE expires_at < $1)
            "#,
        )
        .bind(older_than)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(older_than)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    /// Deletes every session of a user (account deletion)
    pub async fn delete_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
