//! HTTP API consumed by the dashboard UI.

pub mod accounts;
pub mod auth;
pub mod categories;
pub mod compose;
pub mod error;
pub mod inbox;
pub mod oauth;
pub mod tasks;

pub use auth::{AuthUser, Authenticator, StaticTokenAuthenticator};
pub use error::ApiError;
pub use oauth::OAuthStates;

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::accounts::GmailAccount;
use crate::ai::{EmailBodyGenerator, EmailCategorizer, GeneratorConfig, TaskExtractor};
use crate::google::{ContactDirectory, GmailApi, OAuthProvider};
use crate::llm::LlmProvider;
use crate::pipeline::InboxSync;
use crate::store::Database;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub gmail: Arc<dyn GmailApi>,
    pub contacts: Arc<dyn ContactDirectory>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub auth: Arc<dyn Authenticator>,
    pub sync: Arc<InboxSync>,
    pub generator: Arc<EmailBodyGenerator>,
    pub extractor: Arc<TaskExtractor>,
    pub oauth_states: Arc<OAuthStates>,
    /// Dashboard base URL, without a trailing slash.
    pub base_url: String,
}

/// Everything needed to assemble an [`AppState`].
pub struct AppDeps {
    pub db: Arc<dyn Database>,
    pub gmail: Arc<dyn GmailApi>,
    pub contacts: Arc<dyn ContactDirectory>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub auth: Arc<dyn Authenticator>,
    pub llm: Arc<dyn LlmProvider>,
    pub base_url: String,
    pub sync_batch: u32,
    pub generator: GeneratorConfig,
}

impl AppState {
    pub fn new(deps: AppDeps) -> Self {
        let sync = InboxSync::new(
            Arc::clone(&deps.db),
            Arc::clone(&deps.gmail),
            Arc::clone(&deps.contacts),
            Arc::clone(&deps.oauth),
            Arc::new(EmailCategorizer::new(Arc::clone(&deps.llm))),
            deps.sync_batch,
        );
        Self {
            generator: Arc::new(EmailBodyGenerator::new(Arc::clone(&deps.llm), deps.generator)),
            extractor: Arc::new(TaskExtractor::new(deps.llm)),
            sync: Arc::new(sync),
            db: deps.db,
            gmail: deps.gmail,
            contacts: deps.contacts,
            oauth: deps.oauth,
            auth: deps.auth,
            oauth_states: Arc::new(OAuthStates::default()),
            base_url: deps.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The linked account `mail_id`, if `user_id` owns it.
    pub async fn owned_account(&self, user_id: &str, mail_id: &str) -> Result<GmailAccount, ApiError> {
        let forbidden = || ApiError::Forbidden("Gmail account not found or unauthorized".into());
        let id = Uuid::parse_str(mail_id).map_err(|_| forbidden())?;
        match self.db.get_gmail_account(id).await? {
            Some(account) if account.user_id == user_id => Ok(account),
            _ => Err(forbidden()),
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-hub",
    }))
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/google", get(oauth::start_consent))
        .route("/api/auth/google/callback", get(oauth::consent_callback))
        .route("/api/mail/accounts", get(accounts::list_accounts))
        .route("/api/mail/accounts/{mail_id}", delete(accounts::unlink_account))
        .route("/api/mail/inbox/all", get(inbox::all_user_mail))
        .route("/api/mail/generate", post(compose::generate_body))
        .route("/api/mail/{mail_id}/inbox", get(inbox::sync_inbox))
        .route("/api/mail/{mail_id}/inbox/all", get(inbox::account_mail))
        .route("/api/mail/{mail_id}/inbox/{message_id}", get(inbox::mail_detail))
        .route("/api/mail/{mail_id}/inbox/{message_id}/read", patch(inbox::mark_read))
        .route("/api/mail/{mail_id}/inbox/{message_id}/category", patch(inbox::set_category))
        .route("/api/mail/{mail_id}/inbox/{message_id}/task", post(inbox::task_from_mail))
        .route(
            "/api/mail/{mail_id}/inbox/{message_id}/attachment/{attachment_id}",
            get(inbox::download_attachment),
        )
        .route("/api/mail/{mail_id}/send", post(compose::send_mail))
        .route("/api/category", get(categories::list_categories).post(categories::create_category))
        .route(
            "/api/category/{category_id}",
            get(categories::get_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/api/task", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/task/{task_id}", patch(tasks::update_task).delete(tasks::delete_task))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
