//! User-defined mail categories.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use super::{AppState, AuthUser};
use crate::categories::{CategoryPatch, NewCategory, UserCategory};

fn not_found() -> ApiError {
    ApiError::NotFound("Category not found".into())
}

async fn owned_category(state: &AppState, user_id: &str, category_id: &str) -> Result<UserCategory, ApiError> {
    let id = Uuid::parse_str(category_id).map_err(|_| not_found())?;
    state.db.get_category(user_id, id).await?.ok_or_else(not_found)
}

/// Another category of the user's already uses `name`.
async fn name_taken(state: &AppState, user_id: &str, name: &str, except: Option<Uuid>) -> Result<bool, ApiError> {
    Ok(state
        .db
        .find_category_by_name(user_id, name)
        .await?
        .is_some_and(|existing| Some(existing.id) != except))
}

fn duplicate() -> ApiError {
    ApiError::Conflict("Category with this name already exists".into())
}

/// GET /api/category
pub(super) async fn list_categories(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.db.list_categories(&user_id).await?;
    Ok(Json(serde_json::json!({ "data": categories })))
}

/// POST /api/category
pub(super) async fn create_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let (name, color) = request.validate()?;
    if name_taken(&state, &user_id, &name, None).await? {
        return Err(duplicate());
    }

    let category = UserCategory::new(user_id, name, color);
    state.db.create_category(&category).await?;
    info!(category_id = %category.id, name = %category.name, "Category created");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Category created successfully",
            "category": category,
        })),
    ))
}

/// GET /api/category/{category_id}
pub(super) async fn get_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = owned_category(&state, &user_id, &category_id).await?;
    Ok(Json(serde_json::json!({ "category": category })))
}

/// PATCH /api/category/{category_id}
pub(super) async fn update_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(category_id): Path<String>,
    payload: Result<Json<CategoryPatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut category = owned_category(&state, &user_id, &category_id).await?;
    let Json(patch) = payload?;
    patch.apply(&mut category)?;
    if name_taken(&state, &user_id, &category.name, Some(category.id)).await? {
        return Err(duplicate());
    }

    state.db.update_category(&category).await?;
    Ok(Json(serde_json::json!({
        "message": "Category updated",
        "category": category,
    })))
}

/// DELETE /api/category/{category_id}
pub(super) async fn delete_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::parse_str(&category_id).map_err(|_| not_found())?;
    if !state.db.delete_category(&user_id, id).await? {
        return Err(not_found());
    }
    info!(category_id = %id, "Category deleted");
    Ok(Json(serde_json::json!({ "message": "Category deleted successfully" })))
}
