use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateExpenseRequest, DeleteExpenseResponse, UpdateExpenseRequest},
    repo_types::Expense,
};
use crate::{
    auth::extractors::AuthUser, error::AppResult, state::AppState, validation::ValidatedJson,
};

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route(
            "/expenses/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
}

#[instrument(skip(state, principal, payload), fields(user_id = %principal.id))]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateExpenseRequest>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    let expense = state.expenses.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<Vec<Expense>>> {
    Ok(Json(state.expenses.list(&principal).await?))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn get_expense(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Expense>> {
    Ok(Json(state.expenses.get(&principal, &id).await?))
}

#[instrument(skip(state, principal, payload), fields(user_id = %principal.id))]
pub async fn update_expense(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateExpenseRequest>,
) -> AppResult<Json<Expense>> {
    Ok(Json(state.expenses.update(&principal, &id, payload).await?))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteExpenseResponse>> {
    Ok(Json(state.expenses.delete(&principal, &id).await?))
}
