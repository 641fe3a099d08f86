/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,           -- unique, stored lowercase
///     username VARCHAR(50) NOT NULL,         -- unique
///     password_hash VARCHAR(255) NOT NULL,
///     first_name VARCHAR(100),
///     last_name VARCHAR(100),
///     avatar_url VARCHAR(512),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "Ada@Example.com".to_string(),
///     username: "ada".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     first_name: Some("Ada".to_string()),
///     last_name: None,
/// }).await?;
///
/// // Emails are matched case-insensitively
/// let found = User::find_by_identifier(&pool, "ada@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{refresh_token::RefreshToken, session::UserSession};
use crate::auth::verify::VerifiedUser;

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, \
     avatar_url, is_active, is_verified, created_at, updated_at, last_login_at";

/// Shortest accepted username
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Longest accepted username
pub const MAX_USERNAME_LENGTH: usize = 50;

/// User account
///
/// Passwords are stored as Argon2id hashes, never in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, lowercase
    pub email: String,

    /// Unique handle, usable in place of the email at login
    pub username: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub avatar_url: Option<String>,

    /// Disabled accounts cannot log in and their tokens stop verifying
    pub is_active: bool,

    /// Whether the email address has been verified
    pub is_verified: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// When the user last logged in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Email address (normalized to lowercase on insert)
    pub email: String,

    pub username: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,
}

/// Profile fields a user may change
///
/// `None` leaves a field alone; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.avatar_url.is_none()
    }
}

/// Lowercases and trims an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Usernames are 3-50 characters of ASCII letters, digits, `_`, `.` and `-`
pub fn is_valid_username(username: &str) -> bool {
    (MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns a database error carrying `users_email_key` or
    /// `users_username_key` when the email or username is taken.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(normalize_email(&data.email))
        .bind(data.username.trim())
        .bind(data.password_hash)
        .bind(data.first_name)
        .bind(data.last_name)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by email (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by exact username
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username.trim())
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by the login identifier
    ///
    /// Usernames cannot contain `@`, so anything with one is looked up as
    /// an email.
    pub async fn find_by_identifier(
        pool: &PgPool,
        identifier: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        if identifier.contains('@') {
            Self::find_by_email(pool, identifier).await
        } else {
            Self::find_by_username(pool, identifier).await
        }
    }

    /// Applies a profile change, returning the updated user
    ///
    /// Returns `None` if the user no longer exists.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(username) = data.username {
            builder.push(", username = ").push_bind(username.trim().to_string());
        }
        if let Some(first_name) = data.first_name {
            builder.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            builder.push(", last_name = ").push_bind(last_name);
        }
        if let Some(avatar_url) = data.avatar_url {
            builder.push(", avatar_url = ").push_bind(avatar_url);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        builder.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Replaces the password hash
    pub async fn update_password<'e, E>(
        executor: E,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Enables or disables the account
    pub async fn set_active(pool: &PgPool, id: Uuid, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the account and everything that references it
    ///
    /// Refresh tokens go first, then sessions, then the user row, all in one
    /// transaction. Login attempts keep their audit rows with `user_id` set
    /// to NULL by the foreign key.
    pub async fn delete_with_dependents(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        RefreshToken::delete_for_user(&mut *tx, id).await?;
        UserSession::delete_for_user(&mut *tx, id).await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Display name assembled from first and last name
    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        }
    }
}

impl From<&User> for VerifiedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_verified: user.is_verified,
        }
    }
}
