//! Outgoing mail: multipart send and AI body drafting.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;

use super::error::ApiError;
use super::{AppState, AuthUser};
use crate::accounts::ensure_fresh;
use crate::mail::{OutgoingAttachment, OutgoingMail};

#[derive(Debug, Default)]
struct SendForm {
    to: String,
    cc: String,
    bcc: String,
    subject: String,
    message: String,
    attachments: Vec<OutgoingAttachment>,
}

async fn read_form(mut multipart: Multipart) -> Result<SendForm, ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.body_text());
    let mut form = SendForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(filename) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(bad)?;
            if filename.is_empty() && data.is_empty() {
                continue;
            }
            form.attachments.push(OutgoingAttachment {
                filename,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(bad)?;
        match name.as_str() {
            "to" => form.to = value,
            "cc" => form.cc = value,
            "bcc" => form.bcc = value,
            "subject" => form.subject = value,
            "message" => form.message = value,
            _ => {}
        }
    }
    Ok(form)
}

/// POST /api/mail/{mail_id}/send
pub(super) async fn send_mail(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(mail_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.owned_account(&user_id, &mail_id).await?;
    let form = read_form(multipart).await?;

    let mut mail = OutgoingMail::from_form(
        &account.email,
        &form.to,
        &form.cc,
        &form.bcc,
        &form.subject,
        &form.message,
    );
    for attachment in form.attachments {
        mail = mail.with_attachment(attachment);
    }
    let raw = mail.build_raw()?;

    let account = ensure_fresh(state.db.as_ref(), state.oauth.as_ref(), account).await?;
    let id = state.gmail.send_raw(&account.access_token, &raw).await?;
    info!(
        account_id = %account.id,
        recipients = mail.recipient_count(),
        attachments = mail.attachments.len(),
        "Mail sent"
    );

    Ok(Json(serde_json::json!({ "message": "Mail sent successfully", "id": id })))
}

#[derive(Debug, Deserialize)]
pub(super) struct GenerateRequest {
    #[serde(default)]
    subject: Option<String>,
}

/// POST /api/mail/generate
pub(super) async fn generate_body(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let subject = request
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Subject is required".into()))?;

    let body = state.generator.generate(subject).await;
    Ok(Json(serde_json::json!({ "data": body })))
}
