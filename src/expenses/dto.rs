use serde::{Deserialize, Serialize};
use validator::Validate;

use super::repo_types::Expense;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub amount: f64,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: String,
    /// Owner id; parsed by the service so a malformed value maps to an
    /// invalid-identifier error rather than a body error.
    pub user: String,
}

/// Partial update. Unknown keys (including `user`) are ignored, so the
/// owner can't be reassigned through this path.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    pub amount: Option<f64>,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteExpenseResponse {
    pub message: String,
    pub expense: Expense,
}
