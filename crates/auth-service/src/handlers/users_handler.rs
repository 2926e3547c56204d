//! `/api/v1/users` admin handlers. Guarded by [`crate::middleware::require_admin`].

use crate::errors::AuthError;
use crate::models::{CreateUserRequest, UpdateUserRequest, UserResponse};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let user = state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AuthError> {
    Ok(Json(state.users.get(id).await?))
}

/// PATCH /api/v1/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    Ok(Json(state.users.update(id, payload).await?))
}

/// POST /api/v1/users/:id/unban
pub async fn unban_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AuthError> {
    Ok(Json(state.users.unban(id).await?))
}

/// DELETE /api/v1/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AuthError> {
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
