//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::accounts::{GmailAccount, LinkedAccount};
use crate::categories::UserCategory;
use crate::error::DatabaseError;
use crate::mail::InboxMail;
use crate::tasks::Task;

/// Backend-agnostic database trait covering accounts, mirrored mail,
/// categories, and tasks. Every method that takes a `user_id` is scoped
/// to rows owned by that user.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Gmail accounts ──────────────────────────────────────────────

    /// Insert or refresh an account keyed by `(user_id, email)`.
    ///
    /// The first account a user links becomes primary. An existing
    /// refresh token is kept when `link.refresh_token` is `None`.
    async fn upsert_gmail_account(&self, link: &LinkedAccount)
    -> Result<GmailAccount, DatabaseError>;

    async fn get_gmail_account(&self, id: Uuid) -> Result<Option<GmailAccount>, DatabaseError>;

    /// All accounts for a user, primary first then by link time.
    async fn list_gmail_accounts(&self, user_id: &str) -> Result<Vec<GmailAccount>, DatabaseError>;

    /// Persist refreshed credentials. `refresh_token` is only written when `Some`.
    async fn update_account_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError>;

    /// Unlink an account and drop its mirrored mail. Returns false if the
    /// user owns no such account.
    async fn delete_gmail_account(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError>;

    // ── Mirrored mail ───────────────────────────────────────────────

    async fn get_mail(&self, user_id: &str, message_id: &str)
    -> Result<Option<InboxMail>, DatabaseError>;

    /// Insert or update keyed by `(message_id, user_id)`. Never touches the
    /// stored `user_category_id` / `is_categorized` of an existing row.
    async fn upsert_mail(&self, mail: &InboxMail) -> Result<(), DatabaseError>;

    /// Latest `limit` mails for an account (all when `None`), newest first.
    async fn list_account_mails(
        &self,
        account_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<InboxMail>, DatabaseError>;

    /// Every mirrored mail for the user across accounts, newest first.
    async fn list_user_mails(&self, user_id: &str) -> Result<Vec<InboxMail>, DatabaseError>;

    /// Set or clear the user category. `is_categorized` follows `category_id`.
    async fn set_mail_category(
        &self,
        user_id: &str,
        message_id: &str,
        category_id: Option<Uuid>,
    ) -> Result<bool, DatabaseError>;

    async fn mark_mail_read(&self, user_id: &str, message_id: &str) -> Result<bool, DatabaseError>;

    // ── Categories ──────────────────────────────────────────────────

    /// Fails with `DatabaseError::Constraint` on a duplicate name.
    async fn create_category(&self, category: &UserCategory) -> Result<(), DatabaseError>;

    async fn get_category(&self, user_id: &str, id: Uuid)
    -> Result<Option<UserCategory>, DatabaseError>;

    async fn find_category_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<UserCategory>, DatabaseError>;

    /// Newest first.
    async fn list_categories(&self, user_id: &str) -> Result<Vec<UserCategory>, DatabaseError>;

    /// Fails with `DatabaseError::Constraint` when renamed onto an existing name.
    async fn update_category(&self, category: &UserCategory) -> Result<(), DatabaseError>;

    /// Delete and clear the category from any mail filed under it.
    async fn delete_category(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError>;

    // ── Tasks ───────────────────────────────────────────────────────

    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError>;

    async fn get_task(&self, user_id: &str, id: Uuid) -> Result<Option<Task>, DatabaseError>;

    /// Newest first.
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError>;

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError>;

    async fn delete_task(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError>;
}
