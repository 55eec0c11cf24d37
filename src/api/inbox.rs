//! Mirrored inbox: sync, listing, detail, read state, filing, tasks, and
//! attachment download.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::ApiError;
use super::{AppState, AuthUser};
use crate::accounts::{GmailAccount, ensure_fresh};
use crate::mail::{InboxMail, normalize};
use crate::mail::normalize::find_attachment_part;

async fn fresh_account(state: &AppState, account: GmailAccount) -> Result<GmailAccount, ApiError> {
    Ok(ensure_fresh(state.db.as_ref(), state.oauth.as_ref(), account).await?)
}

/// GET /api/mail/inbox/all
pub(super) async fn all_user_mail(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<InboxMail>>, ApiError> {
    Ok(Json(state.db.list_user_mails(&user_id).await?))
}

/// GET /api/mail/{mail_id}/inbox
pub(super) async fn sync_inbox(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(mail_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.owned_account(&user_id, &mail_id).await?;
    let report = state.sync.sync(account).await?;
    Ok(Json(report))
}

/// GET /api/mail/{mail_id}/inbox/all
pub(super) async fn account_mail(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(mail_id): Path<String>,
) -> Result<Json<Vec<InboxMail>>, ApiError> {
    let account = state.owned_account(&user_id, &mail_id).await?;
    Ok(Json(state.db.list_account_mails(account.id, None).await?))
}

/// GET /api/mail/{mail_id}/inbox/{message_id}
///
/// Always fetched live so the body and labels are current; the result is
/// written back to the mirror (keeping any user category).
pub(super) async fn mail_detail(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((mail_id, message_id)): Path<(String, String)>,
) -> Result<Json<InboxMail>, ApiError> {
    let account = state.owned_account(&user_id, &mail_id).await?;
    let account = fresh_account(&state, account).await?;
    let token = account.access_token.as_str();

    let message = state.gmail.get_message(token, &message_id).await?;
    let normalized = normalize(&message);
    let picture = match state.contacts.photo_url(token, &normalized.sender_email).await {
        Ok(url) => url,
        Err(e) => {
            debug!(sender = %normalized.sender_email, error = %e, "Contact photo lookup failed");
            None
        }
    };

    let mail = InboxMail::from_normalized(&user_id, account.id, normalized, picture);
    state.db.upsert_mail(&mail).await?;
    let stored = state.db.get_mail(&user_id, &mail.message_id).await?;
    Ok(Json(stored.unwrap_or(mail)))
}

/// PATCH /api/mail/{mail_id}/inbox/{message_id}/read
pub(super) async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((mail_id, message_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.owned_account(&user_id, &mail_id).await?;
    let account = fresh_account(&state, account).await?;

    state
        .gmail
        .modify_labels(&account.access_token, &message_id, &[], &["UNREAD"])
        .await?;
    state.db.mark_mail_read(&user_id, &message_id).await?;

    Ok(Json(serde_json::json!({ "message": "Message marked as read" })))
}

#[derive(Debug, Deserialize)]
pub(super) struct CategoryChange {
    #[serde(default)]
    new_category: Option<String>,
}

/// PATCH /api/mail/{mail_id}/inbox/{message_id}/category
///
/// An id that names none of the caller's categories clears the category.
pub(super) async fn set_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((mail_id, message_id)): Path<(String, String)>,
    payload: Result<Json<CategoryChange>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_account(&user_id, &mail_id).await?;
    let Json(change) = payload?;
    let requested = change
        .new_category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("New category is required".into()))?;

    let category_id = match Uuid::parse_str(requested) {
        Ok(id) => state.db.get_category(&user_id, id).await?.map(|c| c.id),
        Err(_) => None,
    };
    if !state
        .db
        .set_mail_category(&user_id, &message_id, category_id)
        .await?
    {
        return Err(ApiError::NotFound("Mail not found".into()));
    }
    let updated_mail = state.db.get_mail(&user_id, &message_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Message category updated",
        "updated_mail": updated_mail,
    })))
}

/// POST /api/mail/{mail_id}/inbox/{message_id}/task
pub(super) async fn task_from_mail(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((mail_id, message_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.owned_account(&user_id, &mail_id).await?;
    let mail = state
        .db
        .get_mail(&user_id, &message_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mail not found".into()))?;

    let task = state.extractor.extract(&mail).await.into_task(&user_id)?;
    state.db.create_task(&task).await?;
    info!(task_id = %task.id, message_id = %message_id, "Task created from mail");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "task": task })),
    ))
}

/// GET /api/mail/{mail_id}/inbox/{message_id}/attachment/{attachment_id}
pub(super) async fn download_attachment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((mail_id, message_id, attachment_id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let account = state.owned_account(&user_id, &mail_id).await?;
    let account = fresh_account(&state, account).await?;
    let token = account.access_token.as_str();

    let bytes = state.gmail.get_attachment(token, &message_id, &attachment_id).await?;

    let mirrored = state
        .db
        .get_mail(&user_id, &message_id)
        .await?
        .and_then(|m| m.attachments.into_iter().find(|a| a.attachment_id == attachment_id))
        .map(|a| (a.filename, a.mime_type));
    let (filename, mime_type) = match mirrored {
        Some(meta) => meta,
        None => {
            let message = state.gmail.get_message(token, &message_id).await?;
            message
                .payload
                .as_ref()
                .and_then(|p| find_attachment_part(p, &attachment_id))
                .map(|p| (p.filename.clone(), p.mime_type.clone()))
                .unwrap_or_default()
        }
    };

    let filename = disposition_filename(&filename);
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime_type
    };

    Ok((
        [
            (CONTENT_TYPE, mime_type),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}

/// Filename safe to put inside a quoted `Content-Disposition` parameter.
fn disposition_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.trim().is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}
