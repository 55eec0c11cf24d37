//! Pull a linked Gmail account into the local mirror and categorize it.

use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accounts::{GmailAccount, ensure_fresh};
use crate::ai::{CategorizationInput, EmailCategorizer};
use crate::error::{Error, GoogleError};
use crate::google::{ContactDirectory, GmailApi, OAuthProvider};
use crate::mail::{GmailCategory, InboxMail, normalize};
use crate::store::Database;

/// Message fetches in flight at once.
const FETCH_CONCURRENCY: usize = 8;

/// An uncategorized mail after the categorization pass.
#[derive(Debug, Clone, Serialize)]
pub struct CategorizedMail {
    pub message_id: String,
    pub subject: String,
    pub snippet: String,
    pub sender_name: String,
    pub sender_email: String,
    pub gmail_category: GmailCategory,
    /// `None` when nothing fit (or the user has no categories).
    pub category_id: Option<Uuid>,
}

/// Outcome of one sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Messages fetched from Gmail.
    pub fetched: usize,
    /// Messages written to the mirror.
    pub stored: usize,
    /// Messages left alone because the user already filed them.
    pub skipped: usize,
    /// Messages that could not be fetched.
    pub failed: usize,
    pub mails: Vec<CategorizedMail>,
}

pub struct InboxSync {
    db: Arc<dyn Database>,
    gmail: Arc<dyn GmailApi>,
    contacts: Arc<dyn ContactDirectory>,
    oauth: Arc<dyn OAuthProvider>,
    categorizer: Arc<EmailCategorizer>,
    batch: u32,
}

impl InboxSync {
    pub fn new(
        db: Arc<dyn Database>,
        gmail: Arc<dyn GmailApi>,
        contacts: Arc<dyn ContactDirectory>,
        oauth: Arc<dyn OAuthProvider>,
        categorizer: Arc<EmailCategorizer>,
        batch: u32,
    ) -> Self {
        Self {
            db,
            gmail,
            contacts,
            oauth,
            categorizer,
            batch,
        }
    }

    /// Sync `account`'s newest messages and categorize whatever the user has
    /// not filed yet.
    pub async fn sync(&self, account: GmailAccount) -> Result<SyncReport, Error> {
        let account = ensure_fresh(self.db.as_ref(), self.oauth.as_ref(), account).await?;
        let user_id = account.user_id.as_str();
        let token = account.access_token.as_str();

        let refs = self.gmail.list_messages(token, self.batch).await?;
        info!(account_id = %account.id, count = refs.len(), "Fetching inbox messages");

        let fetched: Vec<Result<InboxMail, (String, GoogleError)>> = stream::iter(refs)
            .map(|r| async move {
                self.fetch_mail(user_id, account.id, token, &r.id)
                    .await
                    .map_err(|e| (r.id, e))
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut report = SyncReport::default();
        for outcome in fetched {
            let mail = match outcome {
                Ok(mail) => mail,
                Err((message_id, e)) => {
                    warn!(message_id = %message_id, error = %e, "Failed to fetch message, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            report.fetched += 1;

            let filed = self
                .db
                .get_mail(user_id, &mail.message_id)
                .await?
                .is_some_and(|existing| existing.user_category_id.is_some());
            if filed {
                debug!(message_id = %mail.message_id, "Mail already categorized, not overwriting");
                report.skipped += 1;
                continue;
            }
            self.db.upsert_mail(&mail).await?;
            report.stored += 1;
        }

        report.mails = self.categorize_pending(&account).await?;
        info!(
            account_id = %account.id,
            fetched = report.fetched,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed,
            categorized = report.mails.iter().filter(|m| m.category_id.is_some()).count(),
            "Inbox sync complete"
        );
        Ok(report)
    }

    async fn fetch_mail(
        &self,
        user_id: &str,
        account_id: Uuid,
        token: &str,
        message_id: &str,
    ) -> Result<InboxMail, GoogleError> {
        let message = self.gmail.get_message(token, message_id).await?;
        let normalized = normalize(&message);

        let picture = if normalized.sender_email.is_empty() {
            None
        } else {
            match self.contacts.photo_url(token, &normalized.sender_email).await {
                Ok(url) => url,
                Err(e) => {
                    debug!(sender = %normalized.sender_email, error = %e, "Contact photo lookup failed");
                    None
                }
            }
        };

        Ok(InboxMail::from_normalized(user_id, account_id, normalized, picture))
    }

    /// Categorize the account's latest uncategorized mail and persist the result.
    async fn categorize_pending(&self, account: &GmailAccount) -> Result<Vec<CategorizedMail>, Error> {
        let pending: Vec<InboxMail> = self
            .db
            .list_account_mails(account.id, Some(self.batch as usize))
            .await?
            .into_iter()
            .filter(|m| m.user_category_id.is_none())
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let categories = self.db.list_categories(&account.user_id).await?;
        if categories.is_empty() {
            debug!(user_id = %account.user_id, "No categories defined, skipping categorization");
            return Ok(pending.iter().map(|m| categorized(m, None)).collect());
        }

        let names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
        let inputs: Vec<CategorizationInput> = pending.iter().map(CategorizationInput::from).collect();
        let assigned = self.categorizer.categorize(&inputs, &names).await;

        let mut result = Vec::with_capacity(pending.len());
        for (mail, name) in pending.iter().zip(assigned) {
            // Names come back in the user's exact spelling, or `Uncategorized`.
            let category_id = categories.iter().find(|c| c.name == name).map(|c| c.id);
            if category_id.is_some() {
                self.db
                    .set_mail_category(&account.user_id, &mail.message_id, category_id)
                    .await?;
            }
            result.push(categorized(mail, category_id));
        }
        Ok(result)
    }
}

fn categorized(mail: &InboxMail, category_id: Option<Uuid>) -> CategorizedMail {
    CategorizedMail {
        message_id: mail.message_id.clone(),
        subject: mail.subject.clone(),
        snippet: mail.snippet.clone(),
        sender_name: mail.sender_name.clone(),
        sender_email: mail.sender_email.clone(),
        gmail_category: mail.gmail_category,
        category_id,
    }
}
