//! User administration handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::User;
use crate::services::user::{ChangeRoleInput, CreateUserInput};
use crate::services::UserService;
use crate::AppState;

/// List all user accounts
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<User>>> {
    let service = UserService::new(state.db);
    let users = service.list(&current_user.0.actor()).await?;
    Ok(Json(users))
}

/// Create a user account
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let service = UserService::new(state.db);
    let user = service.create(&current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// The calling user's own account
pub async fn get_me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<User>> {
    let service = UserService::new(state.db);
    let user = service.get(current_user.0.user_id).await?;
    Ok(Json(user))
}

pub async fn change_user_role(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<i64>,
    Json(input): Json<ChangeRoleInput>,
) -> AppResult<Json<User>> {
    let service = UserService::new(state.db);
    let user = service
        .change_role(&current_user.0.actor(), user_id, input)
        .await?;
    Ok(Json(user))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<User>> {
    let service = UserService::new(state.db);
    let user = service.deactivate(&current_user.0.actor(), user_id).await?;
    Ok(Json(user))
}
