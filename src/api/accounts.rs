//! Linked Gmail account listing and unlinking.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use tracing::info;

use super::error::ApiError;
use super::{AppState, AuthUser};
use crate::accounts::AccountSummary;

/// GET /api/mail/accounts
pub(super) async fn list_accounts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let accounts: Vec<AccountSummary> = state
        .db
        .list_gmail_accounts(&user_id)
        .await?
        .iter()
        .map(|a| a.summary())
        .collect();
    Ok(Json(serde_json::json!({ "data": accounts, "error": null })))
}

/// DELETE /api/mail/accounts/{mail_id}
pub(super) async fn unlink_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(mail_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.owned_account(&user_id, &mail_id).await?;
    state.db.delete_gmail_account(&user_id, account.id).await?;
    info!(account_id = %account.id, email = %account.email, "Gmail account unlinked");
    Ok(Json(serde_json::json!({ "message": "Gmail account unlinked" })))
}
