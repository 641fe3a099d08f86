/// Task model and database operations
///
/// Tasks belong to a user and optionally to one of that user's categories.
/// Status changes go through [`Task::transition`], which enforces the
/// transition table below and keeps `completed_at` in step.
///
/// # Status transitions
///
/// ```text
/// todo        -> in_progress | completed | cancelled
/// in_progress -> todo | completed | cancelled
/// completed   -> todo
/// cancelled   -> todo
/// ```
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::models::task::{CreateTask, Task, TaskPriority, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, owner, CreateTask {
///     title: "Write report".to_string(),
///     description: None,
///     category_id: None,
///     priority: TaskPriority::High,
///     due_date: None,
/// }).await?;
///
/// let started = Task::transition(&pool, task.id, owner, task.status, TaskStatus::InProgress).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, user_id, category_id, title, description, status, priority, \
     due_date, completed_at, created_at, updated_at";

/// Longest task title
pub const MAX_TITLE_LENGTH: usize = 200;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Completed or cancelled (only reopening is allowed from here)
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Checks if transition to target status is allowed
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        match (self, target) {
            (TaskStatus::Todo, TaskStatus::InProgress) => true,
            (TaskStatus::Todo, TaskStatus::Completed) => true,
            (TaskStatus::Todo, TaskStatus::Cancelled) => true,

            (TaskStatus::InProgress, TaskStatus::Todo) => true,
            (TaskStatus::InProgress, TaskStatus::Completed) => true,
            (TaskStatus::InProgress, TaskStatus::Cancelled) => true,

            // Reopen
            (TaskStatus::Completed, TaskStatus::Todo) => true,
            (TaskStatus::Cancelled, TaskStatus::Todo) => true,

            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Owner (auth service user id)
    pub user_id: Uuid,

    /// Category, cleared if the category is deleted
    pub category_id: Option<Uuid>,

    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,

    /// Set while the task is completed
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update; `Some(None)` clears a nullable field
///
/// Status is not part of it, see [`Task::transition`].
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<Uuid>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl Task {
    /// Creates a task in `todo`
    ///
    /// The caller is responsible for checking that `category_id` belongs to
    /// the same owner.
    pub async fn create(pool: &PgPool, user_id: Uuid, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (user_id, category_id, title, description, priority, due_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.category_id)
        .bind(data.title.trim())
        .bind(data.description)
        .bind(data.priority)
        .bind(data.due_date)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task owned by `user_id`
    pub async fn find_for_owner(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// All tasks of an owner, newest first
    pub async fn list_for_owner(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Applies a partial update; `None` if the task is not the owner's
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            builder.push(", title = ").push_bind(title.trim().to_string());
        }
        if let Some(description) = data.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(category_id) = data.category_id {
            builder.push(", category_id = ").push_bind(category_id);
        }
        if let Some(priority) = data.priority {
            builder.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = data.due_date {
            builder.push(", due_date = ").push_bind(due_date);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(TASK_COLUMNS);

        builder.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Moves a task from `from` to `to`
    ///
    /// The update only applies while the stored status is still `from`, so
    /// two concurrent transitions cannot both succeed. Returns `None` when
    /// the task is missing, not the owner's or no longer in `from`.
    /// Callers check [`TaskStatus::can_transition_to`] first.
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET status = $4,
                completed_at = CASE WHEN $4 = 'completed'::task_status THEN NOW() ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = $3
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    #[test]
    fn test_same_state_transitions_rejected() {
        for status in ALL {
            assert!(!status.can_transition_to(status), "{} -> {}", status, status);
        }
    }

    #[test]
    fn test_open_states_can_close() {
        for from in [TaskStatus::Todo, TaskStatus::InProgress] {
            assert!(from.can_transition_to(TaskStatus::Completed));
            assert!(from.can_transition_to(TaskStatus::Cancelled));
        }
        assert!(TaskStatus::Todo.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Todo));
    }

    #[test]
    fn test_closed_states_only_reopen() {
        for from in [TaskStatus::Completed, TaskStatus::Cancelled] {
            assert!(from.is_closed());
            assert!(from.can_transition_to(TaskStatus::Todo));
            assert!(!from.can_transition_to(TaskStatus::InProgress));
        }
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            "in_progress"
        );
        let parsed: TaskStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, TaskStatus::Cancelled);
        for status in ALL {
            assert_eq!(serde_json::to_value(status).unwrap(), status.as_str());
        }
    }

    #[test]
    fn test_priority_default_and_order() {
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(TaskPriority::Low < TaskPriority::Medium);
        assert_eq!(serde_json::to_value(TaskPriority::Urgent).unwrap(), "urgent");
    }
}
