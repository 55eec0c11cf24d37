//! Kanban task CRUD.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use super::error::ApiError;
use super::{AppState, AuthUser};
use crate::tasks::{NewTask, Task, TaskPatch};

fn not_found() -> ApiError {
    ApiError::NotFound("Task not found".into())
}

fn parse_id(task_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(task_id).map_err(|_| not_found())
}

/// GET /api/task
pub(super) async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.db.list_tasks(&user_id).await?))
}

/// POST /api/task
pub(super) async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let task = request.into_task(&user_id)?;
    state.db.create_task(&task).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /api/task/{task_id}
pub(super) async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&task_id)?;
    let mut task = state.db.get_task(&user_id, id).await?.ok_or_else(not_found)?;
    let Json(patch) = payload?;
    patch.apply(&mut task)?;
    state.db.update_task(&task).await?;
    Ok(Json(task))
}

/// DELETE /api/task/{task_id}
pub(super) async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.delete_task(&user_id, parse_id(&task_id)?).await? {
        return Err(not_found());
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
