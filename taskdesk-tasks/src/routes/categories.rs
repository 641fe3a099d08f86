/// Category endpoints
///
/// - `GET /v1/categories` - List the caller's categories
/// - `POST /v1/categories` - Create a category (201)
/// - `GET /v1/categories/:id` - Get one category
/// - `PATCH /v1/categories/:id` - Update a category
/// - `DELETE /v1/categories/:id` - Delete a category; its tasks lose the category
///
/// Names are unique per owner: duplicates give `409 Conflict`.

use crate::app::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskdesk_shared::{
    auth::middleware::AuthContext,
    error::{validate_request, ApiError, ApiResult},
    models::{
        category::{is_valid_color, Category, CreateCategory, UpdateCategory, MAX_NAME_LENGTH},
        deserialize_some,
    },
};
use uuid::Uuid;
use validator::Validate;

const DUPLICATE_NAME: &str = "A category with this name already exists";
const MAX_ICON_LENGTH: usize = 50;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// `#RRGGBB`; defaults to `#6366f1`
    pub color: Option<String>,

    #[validate(length(max = 50, message = "Icon must be at most 50 characters"))]
    pub icon: Option<String>,

    pub description: Option<String>,
}

/// Partial update; omitted fields are unchanged, `null` clears icon or description
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub color: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub icon: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

fn check_name(name: &str) -> ApiResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::invalid_field("name", "Name must be 1-100 characters"));
    }
    Ok(trimmed.to_string())
}

fn check_color(color: Option<&String>) -> ApiResult<()> {
    match color {
        Some(color) if !is_valid_color(color) => Err(ApiError::invalid_field(
            "color",
            "Color must be a hex value like #6366f1",
        )),
        _ => Ok(()),
    }
}

impl UpdateCategoryRequest {
    fn into_update(self) -> ApiResult<UpdateCategory> {
        check_color(self.color.as_ref())?;
        if matches!(&self.icon, Some(Some(icon)) if icon.chars().count() > MAX_ICON_LENGTH) {
            return Err(ApiError::invalid_field(
                "icon",
                "Icon must be at most 50 characters",
            ));
        }

        Ok(UpdateCategory {
            name: self.name.as_deref().map(check_name).transpose()?,
            color: self.color,
            icon: self.icon,
            description: self.description,
            is_active: self.is_active,
        })
    }
}

async fn find_owned(state: &AppState, id: Uuid, auth: &AuthContext) -> ApiResult<Category> {
    Category::find_for_owner(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))
}

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CategoryListResponse>> {
    let categories = Category::list_for_owner(&state.db, auth.user_id).await?;
    Ok(Json(CategoryListResponse { categories }))
}

/// Creates a category
///
/// # Errors
///
/// - `409 Conflict`: The caller already has a category with this name
/// - `422 Unprocessable Entity`: Invalid name, color or icon
pub async fn create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    validate_request(&req)?;
    let name = check_name(&req.name)?;
    check_color(req.color.as_ref())?;

    if Category::name_taken(&state.db, auth.user_id, &name, None).await? {
        return Err(ApiError::Conflict(DUPLICATE_NAME.to_string()));
    }

    // A concurrent insert can still win; the unique constraint maps to 409
    let category = Category::create(
        &state.db,
        auth.user_id,
        CreateCategory {
            name,
            color: req.color,
            icon: req.icon,
            description: req.description,
        },
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Category>> {
    Ok(Json(find_owned(&state, id, &auth).await?))
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    validate_request(&req)?;
    let update = req.into_update()?;

    if let Some(name) = &update.name {
        if Category::name_taken(&state.db, auth.user_id, name, Some(id)).await? {
            return Err(ApiError::Conflict(DUPLICATE_NAME.to_string()));
        }
    }

    let category = Category::update(&state.db, id, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))?;

    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Category::delete(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Category not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
