use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateUserRequest, DeleteUserResponse, UpdateUserRequest},
    repo_types::User,
};
use crate::{
    auth::extractors::AuthUser, error::AppResult, state::AppState, validation::ValidatedJson,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
}

#[instrument(skip(state, principal, payload), fields(user_id = %principal.id))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.users.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list(&principal).await?))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.get(&principal, &id).await?))
}

#[instrument(skip(state, principal, payload), fields(user_id = %principal.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.update(&principal, &id, payload).await?))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteUserResponse>> {
    Ok(Json(state.users.delete(&principal, &id).await?))
}
