/// Task endpoints
///
/// - `GET /v1/tasks` - List the caller's tasks, newest first
/// - `POST /v1/tasks` - Create a task in `todo` (201)
/// - `GET /v1/tasks/:id` - Get one task
/// - `PATCH /v1/tasks/:id` - Update title, description, category, priority or due date
/// - `DELETE /v1/tasks/:id` - Delete a task
/// - `POST /v1/tasks/:id/status` - Move a task to another status
///
/// # Status transitions
///
/// ```text
/// todo ──> in_progress ──> completed ──> todo (reopen)
///   │          │  └──────> todo
///   │          └─────────> cancelled ──> todo (reopen)
///   ├──────────────────────> completed
///   └──────────────────────> cancelled
/// ```
///
/// Anything else is `409 Conflict`.

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
    error::{validate_request, ApiError, ApiResult},
    models::{
        category::Category,
        deserialize_some,
        task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask, MAX_TITLE_LENGTH},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub description: Option<String>,

    /// Must be one of the caller's categories
    pub category_id: Option<Uuid>,

    #[serde(default)]
    pub priority: TaskPriority,

    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update; omitted fields are unchanged, `null` clears a nullable field
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<Uuid>>,

    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

fn check_title(title: &str) -> ApiResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::invalid_field("title", "Title must be 1-200 characters"));
    }
    Ok(trimmed.to_string())
}

/// Rejects a category the caller does not own
async fn check_category(state: &AppState, auth: &AuthContext, category_id: Uuid) -> ApiResult<()> {
    if Category::find_for_owner(&state.db, category_id, auth.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::invalid_field("category_id", "Category not found"));
    }
    Ok(())
}

/// Error for a transition the state machine does not allow
fn illegal_transition(from: TaskStatus, to: TaskStatus) -> ApiError {
    if from == to {
        ApiError::Conflict(format!("Task is already {}", to))
    } else {
        ApiError::Conflict(format!("Cannot change task status from {} to {}", from, to))
    }
}

async fn find_owned(state: &AppState, id: Uuid, auth: &AuthContext) -> ApiResult<Task> {
    Task::find_for_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskListResponse>> {
    let tasks = Task::list_for_owner(&state.db, auth.user_id).await?;
    Ok(Json(TaskListResponse { tasks }))
}

/// Creates a task
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Invalid title or a category the caller does not own
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    validate_request(&req)?;
    let title = check_title(&req.title)?;
    if let Some(category_id) = req.category_id {
        check_category(&state, &auth, category_id).await?;
    }

    let task = Task::create(
        &state.db,
        auth.user_id,
        CreateTask {
            title,
            description: req.description,
            category_id: req.category_id,
            priority: req.priority,
            due_date: req.due_date,
        },
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, task_id = %task.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(find_owned(&state, id, &auth).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    validate_request(&req)?;

    let title = req.title.as_deref().map(check_title).transpose()?;
    if let Some(Some(category_id)) = req.category_id {
        check_category(&state, &auth, category_id).await?;
    }

    let update = UpdateTask {
        title,
        description: req.description,
        category_id: req.category_id,
        priority: req.priority,
        due_date: req.due_date,
    };

    let task = Task::update(&state.db, id, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Task::delete(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Moves a task to another status
///
/// # Errors
///
/// - `404 Not Found`: No such task for this user
/// - `409 Conflict`: Transition not allowed, or the task changed concurrently
pub async fn change_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> ApiResult<Json<Task>> {
    let task = find_owned(&state, id, &auth).await?;

    if !task.status.can_transition_to(req.status) {
        return Err(illegal_transition(task.status, req.status));
    }

    let updated = Task::transition(&state.db, id, auth.user_id, task.status, req.status)
        .await?
        .ok_or_else(|| ApiError::Conflict("Task status changed concurrently".to_string()))?;

    tracing::info!(
        task_id = %id,
        from = %task.status,
        to = %updated.status,
        "Task status changed"
    );
    Ok(Json(updated))
}
