/// Refresh token records
///
/// Only the SHA-256 digest of a refresh JWT is stored. Rotation revokes the
/// presented token and links it to its successor through `replaced_by`;
/// seeing a revoked token that has a successor means the token was reused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const REFRESH_TOKEN_COLUMNS: &str = "id, user_id, session_id, token_hash, expires_at, \
     revoked_at, replaced_by, device_name, ip_address, user_agent, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,

    /// SHA-256 hex digest of the token
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,

    /// Successor issued when this token was rotated
    pub replaced_by: Option<Uuid>,

    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateRefreshToken {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshToken {
    /// Neither revoked nor expired
    pub fn is_usable(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }

    /// Revoked by rotation (as opposed to logout)
    pub fn was_rotated(&self) -> bool {
        self.revoked_at.is_some() && self.replaced_by.is_some()
    }

    pub async fn create<'e, E>(executor: E, data: CreateRefreshToken) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            r#"
            INSERT INTO refresh_tokens
                (user_id, session_id, token_hash, expires_at, device_name, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {REFRESH_TOKEN_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.session_id)
        .bind(data.token_hash)
        .bind(data.expires_at)
        .bind(data.device_name)
        .bind(data.ip_address)
        .bind(data.user_agent)
        .fetch_one(executor)
        .await?;

        Ok(token)
    }

    /// Looks a token up by digest, locking the row for the transaction
    pub async fn find_by_hash<'e, E>(
        executor: E,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1 FOR UPDATE"
        ))
        .bind(token_hash)
        .fetch_optional(executor)
        .await?;

        Ok(token)
    }

    /// Marks `id` as rotated into `successor`
    ///
    /// Returns false when the token had already been revoked, which happens
    /// if two refreshes race on the same token.
    pub async fn rotate<'e, E>(executor: E, id: Uuid, successor: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW(), replaced_by = $2
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(successor)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_for_session<'e, E>(executor: E, session_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE session_id = $1 AND revoked_at IS NULL",
        )
        .bind(session_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Revokes the user's tokens, optionally sparing one session's tokens
    pub async fn revoke_all_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
        except_session: Option<Uuid>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE user_id = $1
              AND revoked_at IS NULL
              AND ($2::uuid IS NULL OR session_id <> $2)
            "#,
        )
        .bind(user_id)
        .bind(except_session)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Purges tokens that expired before `older_than`
    pub async fn delete_expired(pool: &PgPool, older_than: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        // Successors may point at rows being removed
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE refresh_tokens SET replaced_by = NULL
            WHERE replaced_by IN (SELECT id FROM refresh_tokens WHERE expires_at < $1)
            "#,
        )
        .bind(older_than)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(older_than)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    /// Deletes every token of a user (account deletion)
    pub async fn delete_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
