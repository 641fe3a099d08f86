/// Task categories
///
/// Categories are owned by a user of the auth service. The owner id is not a
/// foreign key (the users table lives in another database), so every query
/// is scoped by `user_id` and another user's category looks the same as a
/// missing one.
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::models::category::{Category, CreateCategory};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid) -> Result<(), sqlx::Error> {
/// let work = Category::create(&pool, owner, CreateCategory {
///     name: "Work".to_string(),
///     color: None,
///     icon: Some("briefcase".to_string()),
///     description: None,
/// }).await?;
///
/// let mine = Category::list_for_owner(&pool, owner).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const CATEGORY_COLUMNS: &str =
    "id, user_id, name, color, icon, description, is_active, created_at, updated_at";

/// Color used when none is given
pub const DEFAULT_COLOR: &str = "#6366f1";

/// Longest category name
pub const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,

    /// Owner (auth service user id)
    pub user_id: Uuid,

    /// Unique per owner
    pub name: String,

    /// `#RRGGBB`
    pub color: String,

    pub icon: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCategory {
    pub name: String,
    /// Falls back to [`DEFAULT_COLOR`]
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

/// Partial update; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Checks the `#RRGGBB` format
pub fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Category {
    /// Creates a category for `user_id`
    ///
    /// # Errors
    ///
    /// A duplicate name for the same owner violates
    /// `categories_user_id_name_key`.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CreateCategory,
    ) -> Result<Self, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (user_id, name, color, icon, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.name.trim())
        .bind(data.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()))
        .bind(data.icon)
        .bind(data.description)
        .fetch_one(pool)
        .await?;

        Ok(category)
    }

    /// Finds a category owned by `user_id`
    pub async fn find_for_owner(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(category)
    }

    /// All categories of an owner, by name
    pub async fn list_for_owner(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE user_id = $1 ORDER BY name ASC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(categories)
    }

    /// Applies a partial update; `None` if the category is not the owner's
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateCategory,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder =
            QueryBuilder::<Postgres>::new("UPDATE categories SET updated_at = NOW()");

        if let Some(name) = data.name {
            builder.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(color) = data.color {
            builder.push(", color = ").push_bind(color);
        }
        if let Some(icon) = data.icon {
            builder.push(", icon = ").push_bind(icon);
        }
        if let Some(description) = data.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(is_active) = data.is_active {
            builder.push(", is_active = ").push_bind(is_active);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(CATEGORY_COLUMNS);

        builder.build_query_as::<Category>().fetch_optional(pool).await
    }

    /// Deletes a category; its tasks keep existing without a category
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the owner already has a category called `name`
    ///
    /// `exclude` skips one category, for renames.
    pub async fn name_taken(
        pool: &PgPool,
        user_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM categories
                WHERE user_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(user_id)
        .bind(name.trim())
        .bind(exclude)
        .fetch_one(pool)
        .await?;

        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_format() {
        assert!(is_valid_color(DEFAULT_COLOR));
        assert!(is_valid_color("#FFAA00"));
        assert!(!is_valid_color("FFAA00"));
        assert!(!is_valid_color("#FFAA0"));
        assert!(!is_valid_color("#GGGGGG"));
        assert!(!is_valid_color("#ffaa00ff"));
    }

    #[test]
    fn test_update_category_default_changes_nothing() {
        let update = UpdateCategory::default();
        assert!(update.name.is_none());
        assert!(update.icon.is_none());
        assert!(update.is_active.is_none());
    }
}
