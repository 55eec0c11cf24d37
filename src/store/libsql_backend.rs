//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::accounts::{GmailAccount, LinkedAccount};
use crate::categories::{CategoryColor, UserCategory};
use crate::error::DatabaseError;
use crate::mail::{Attachment, InboxMail};
use crate::store::migrations;
use crate::store::traits::Database;
use crate::tasks::Task;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_json_list<T: serde::de::DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    opt_text(dt.map(|d| d.to_rfc3339()).as_deref())
}

/// Fixed-width UTC RFC 3339, so text order matches time order.
fn opt_sortable_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    opt_text(
        dt.map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
            .as_deref(),
    )
}

/// Map a unique-index violation to `Constraint`, anything else to `Query`.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

/// Column order:
/// 0:id, 1:user_id, 2:email, 3:access_token, 4:refresh_token, 5:token_expires_at,
/// 6:name, 7:picture, 8:is_primary, 9:created_at, 10:updated_at
const ACCOUNT_COLUMNS: &str = "id, user_id, email, access_token, refresh_token, token_expires_at, name, picture, is_primary, created_at, updated_at";

fn row_to_account(row: &libsql::Row) -> Result<GmailAccount, libsql::Error> {
    let id_str: String = row.get(0)?;
    let expires_str: Option<String> = row.get(5).ok();
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;

    Ok(GmailAccount {
        id: parse_uuid(&id_str),
        user_id: row.get(1)?,
        email: row.get(2)?,
        access_token: row.get(3)?,
        refresh_token: row.get(4).ok(),
        token_expires_at: parse_optional_datetime(&expires_str),
        name: row.get(6).ok(),
        picture: row.get(7).ok(),
        is_primary: row.get::<i64>(8)? != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const MAIL_COLUMNS: &str = "id, message_id, user_id, account_id, thread_id, subject, snippet, from_header, to_header, sender_name, sender_email, sender_picture, cc, bcc, date, body, attachments, label_ids, is_unread, gmail_category, user_category_id, is_categorized, created_at, updated_at";

fn row_to_mail(row: &libsql::Row) -> Result<InboxMail, libsql::Error> {
    let id_str: String = row.get(0)?;
    let account_str: String = row.get(3)?;
    let cc_str: String = row.get(12)?;
    let bcc_str: String = row.get(13)?;
    let date_str: Option<String> = row.get(14).ok();
    let attachments_str: String = row.get(16)?;
    let labels_str: String = row.get(17)?;
    let category_str: String = row.get(19)?;
    let user_category: Option<String> = row.get(20).ok();
    let created_str: String = row.get(22)?;
    let updated_str: String = row.get(23)?;

    Ok(InboxMail {
        id: parse_uuid(&id_str),
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        account_id: parse_uuid(&account_str),
        thread_id: row.get(4).ok(),
        subject: row.get(5)?,
        snippet: row.get(6)?,
        from: row.get(7)?,
        to: row.get(8)?,
        sender_name: row.get(9)?,
        sender_email: row.get(10)?,
        sender_picture: row.get(11).ok(),
        cc: parse_json_list(&cc_str),
        bcc: parse_json_list(&bcc_str),
        date: parse_optional_datetime(&date_str),
        body: row.get(15)?,
        attachments: parse_json_list::<Attachment>(&attachments_str),
        label_ids: parse_json_list(&labels_str),
        is_unread: row.get::<i64>(18)? != 0,
        gmail_category: category_str.parse().unwrap_or_default(),
        user_category_id: user_category.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        is_categorized: row.get::<i64>(21)? != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const CATEGORY_COLUMNS: &str = "id, user_id, name, color, created_at, updated_at";

fn row_to_category(row: &libsql::Row) -> Result<UserCategory, libsql::Error> {
    let id_str: String = row.get(0)?;
    let color_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    Ok(UserCategory {
        id: parse_uuid(&id_str),
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: color_str.parse().unwrap_or(CategoryColor::Gray),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const TASK_COLUMNS: &str = "id, user_id, title, description, status, priority, due_date, tags, related_links, source_message_id, created_at, updated_at";

fn row_to_task(row: &libsql::Row) -> Result<Task, libsql::Error> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(4)?;
    let priority_str: String = row.get(5)?;
    let due_str: Option<String> = row.get(6).ok();
    let tags_str: String = row.get(7)?;
    let links_str: String = row.get(8)?;
    let created_str: String = row.get(10)?;
    let updated_str: String = row.get(11)?;

    Ok(Task {
        id: parse_uuid(&id_str),
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: status_str.parse().unwrap_or_default(),
        priority: priority_str.parse().unwrap_or_default(),
        due_date: parse_optional_datetime(&due_str),
        tags: parse_json_list(&tags_str),
        related_links: parse_json_list(&links_str),
        source_message_id: row.get(9).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

impl LibSqlBackend {
    async fn query_accounts(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<GmailAccount>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        let mut accounts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            match row_to_account(&row) {
                Ok(account) => accounts.push(account),
                Err(e) => tracing::warn!("Skipping account row: {e}"),
            }
        }
        Ok(accounts)
    }

    async fn query_mails(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<InboxMail>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        let mut mails = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            match row_to_mail(&row) {
                Ok(mail) => mails.push(mail),
                Err(e) => tracing::warn!("Skipping mail row: {e}"),
            }
        }
        Ok(mails)
    }

    async fn query_categories(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<UserCategory>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        let mut categories = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            match row_to_category(&row) {
                Ok(category) => categories.push(category),
                Err(e) => tracing::warn!("Skipping category row: {e}"),
            }
        }
        Ok(categories)
    }

    async fn query_tasks(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Task>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            match row_to_task(&row) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::warn!("Skipping task row: {e}"),
            }
        }
        Ok(tasks)
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Gmail accounts ──────────────────────────────────────────────

    async fn upsert_gmail_account(
        &self,
        link: &LinkedAccount,
    ) -> Result<GmailAccount, DatabaseError> {
        let conn = self.conn();
        let email = link.normalized_email();
        let now = Utc::now().to_rfc3339();

        let existing = self
            .query_accounts(
                "upsert_gmail_account",
                &format!("SELECT {ACCOUNT_COLUMNS} FROM gmail_accounts WHERE user_id = ?1 AND email = ?2"),
                params![link.user_id.as_str(), email.as_str()],
            )
            .await?
            .into_iter()
            .next();

        let id = match existing {
            Some(account) => {
                conn.execute(
                    "UPDATE gmail_accounts SET access_token = ?1, refresh_token = COALESCE(?2, refresh_token), token_expires_at = ?3, name = COALESCE(?4, name), picture = COALESCE(?5, picture), updated_at = ?6 WHERE id = ?7",
                    params![
                        link.access_token.as_str(),
                        opt_text(link.refresh_token.as_deref()),
                        opt_datetime(link.token_expires_at),
                        opt_text(link.name.as_deref()),
                        opt_text(link.picture.as_deref()),
                        now.as_str(),
                        account.id.to_string(),
                    ],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("upsert_gmail_account update: {e}")))?;
                debug!(account_id = %account.id, email = %email, "Gmail account credentials updated");
                account.id
            }
            None => {
                let id = Uuid::new_v4();
                let has_accounts = !self.list_gmail_accounts(&link.user_id).await?.is_empty();
                conn.execute(
                    &format!("INSERT INTO gmail_accounts ({ACCOUNT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
                    params![
                        id.to_string(),
                        link.user_id.as_str(),
                        email.as_str(),
                        link.access_token.as_str(),
                        opt_text(link.refresh_token.as_deref()),
                        opt_datetime(link.token_expires_at),
                        opt_text(link.name.as_deref()),
                        opt_text(link.picture.as_deref()),
                        i64::from(!has_accounts),
                        now.as_str(),
                        now.as_str(),
                    ],
                )
                .await
                .map_err(|e| write_error("upsert_gmail_account insert", e))?;
                info!(account_id = %id, user_id = %link.user_id, email = %email, primary = !has_accounts, "Gmail account linked");
                id
            }
        };

        self.get_gmail_account(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "gmail_account".into(),
                id: id.to_string(),
            })
    }

    async fn get_gmail_account(&self, id: Uuid) -> Result<Option<GmailAccount>, DatabaseError> {
        Ok(self
            .query_accounts(
                "get_gmail_account",
                &format!("SELECT {ACCOUNT_COLUMNS} FROM gmail_accounts WHERE id = ?1"),
                params![id.to_string()],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn list_gmail_accounts(&self, user_id: &str) -> Result<Vec<GmailAccount>, DatabaseError> {
        self.query_accounts(
            "list_gmail_accounts",
            &format!(
                "SELECT {ACCOUNT_COLUMNS} FROM gmail_accounts WHERE user_id = ?1 ORDER BY is_primary DESC, created_at ASC"
            ),
            params![user_id],
        )
        .await
    }

    async fn update_account_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE gmail_accounts SET access_token = ?1, refresh_token = COALESCE(?2, refresh_token), token_expires_at = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    access_token,
                    opt_text(refresh_token),
                    opt_datetime(expires_at),
                    now,
                    id.to_string()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_account_tokens: {e}")))?;

        debug!(account_id = %id, "Account tokens updated");
        Ok(())
    }

    async fn delete_gmail_account(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let deleted = conn
            .execute(
                "DELETE FROM gmail_accounts WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_gmail_account: {e}")))?;
        if deleted == 0 {
            return Ok(false);
        }

        let mails = conn
            .execute(
                "DELETE FROM inbox_mails WHERE account_id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_gmail_account mails: {e}")))?;

        // Promote the oldest remaining account when the primary was removed.
        conn.execute(
            "UPDATE gmail_accounts SET is_primary = 1
             WHERE id = (SELECT id FROM gmail_accounts WHERE user_id = ?1 ORDER BY created_at ASC LIMIT 1)
               AND NOT EXISTS (SELECT 1 FROM gmail_accounts WHERE user_id = ?1 AND is_primary = 1)",
            params![user_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("delete_gmail_account promote: {e}")))?;

        info!(account_id = %id, user_id = %user_id, mails_removed = mails, "Gmail account unlinked");
        Ok(true)
    }

    // ── Mirrored mail ───────────────────────────────────────────────

    async fn get_mail(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Option<InboxMail>, DatabaseError> {
        Ok(self
            .query_mails(
                "get_mail",
                &format!("SELECT {MAIL_COLUMNS} FROM inbox_mails WHERE user_id = ?1 AND message_id = ?2"),
                params![user_id, message_id],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn upsert_mail(&self, mail: &InboxMail) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO inbox_mails ({MAIL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
                     ON CONFLICT(message_id, user_id) DO UPDATE SET
                        account_id = excluded.account_id,
                        thread_id = excluded.thread_id,
                        subject = excluded.subject,
                        snippet = excluded.snippet,
                        from_header = excluded.from_header,
                        to_header = excluded.to_header,
                        sender_name = excluded.sender_name,
                        sender_email = excluded.sender_email,
                        sender_picture = COALESCE(excluded.sender_picture, inbox_mails.sender_picture),
                        cc = excluded.cc,
                        bcc = excluded.bcc,
                        date = excluded.date,
                        body = excluded.body,
                        attachments = excluded.attachments,
                        label_ids = excluded.label_ids,
                        is_unread = excluded.is_unread,
                        gmail_category = excluded.gmail_category,
                        updated_at = excluded.updated_at"
                ),
                params![
                    mail.id.to_string(),
                    mail.message_id.as_str(),
                    mail.user_id.as_str(),
                    mail.account_id.to_string(),
                    opt_text(mail.thread_id.as_deref()),
                    mail.subject.as_str(),
                    mail.snippet.as_str(),
                    mail.from.as_str(),
                    mail.to.as_str(),
                    mail.sender_name.as_str(),
                    mail.sender_email.as_str(),
                    opt_text(mail.sender_picture.as_deref()),
                    to_json(&mail.cc)?,
                    to_json(&mail.bcc)?,
                    opt_sortable_datetime(mail.date),
                    mail.body.as_str(),
                    to_json(&mail.attachments)?,
                    to_json(&mail.label_ids)?,
                    i64::from(mail.is_unread),
                    mail.gmail_category.as_str(),
                    opt_text(mail.user_category_id.map(|id| id.to_string()).as_deref()),
                    i64::from(mail.is_categorized),
                    mail.created_at.to_rfc3339(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_mail: {e}")))?;

        debug!(message_id = %mail.message_id, user_id = %mail.user_id, "Mail upserted");
        Ok(())
    }

    async fn list_account_mails(
        &self,
        account_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<InboxMail>, DatabaseError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |l| l as i64);
        self.query_mails(
            "list_account_mails",
            &format!(
                "SELECT {MAIL_COLUMNS} FROM inbox_mails WHERE account_id = ?1 ORDER BY date DESC, created_at DESC LIMIT ?2"
            ),
            params![account_id.to_string(), limit],
        )
        .await
    }

    async fn list_user_mails(&self, user_id: &str) -> Result<Vec<InboxMail>, DatabaseError> {
        self.query_mails(
            "list_user_mails",
            &format!(
                "SELECT {MAIL_COLUMNS} FROM inbox_mails WHERE user_id = ?1 ORDER BY date DESC, created_at DESC"
            ),
            params![user_id],
        )
        .await
    }

    async fn set_mail_category(
        &self,
        user_id: &str,
        message_id: &str,
        category_id: Option<Uuid>,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn()
            .execute(
                "UPDATE inbox_mails SET user_category_id = ?1, is_categorized = ?2, updated_at = ?3 WHERE user_id = ?4 AND message_id = ?5",
                params![
                    opt_text(category_id.map(|id| id.to_string()).as_deref()),
                    i64::from(category_id.is_some()),
                    now,
                    user_id,
                    message_id
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_mail_category: {e}")))?;

        debug!(message_id = %message_id, category_id = ?category_id, "Mail category set");
        Ok(updated > 0)
    }

    async fn mark_mail_read(&self, user_id: &str, message_id: &str) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn()
            .execute(
                "UPDATE inbox_mails SET is_unread = 0, label_ids = COALESCE((SELECT json_group_array(value) FROM json_each(label_ids) WHERE value != 'UNREAD'), '[]'), updated_at = ?1 WHERE user_id = ?2 AND message_id = ?3",
                params![now, user_id, message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_mail_read: {e}")))?;
        Ok(updated > 0)
    }

    // ── Categories ──────────────────────────────────────────────────

    async fn create_category(&self, category: &UserCategory) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO user_categories ({CATEGORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    category.id.to_string(),
                    category.user_id.as_str(),
                    category.name.as_str(),
                    category.color.as_str(),
                    category.created_at.to_rfc3339(),
                    category.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("create_category", e))?;

        debug!(category_id = %category.id, name = %category.name, "Category created");
        Ok(())
    }

    async fn get_category(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<UserCategory>, DatabaseError> {
        Ok(self
            .query_categories(
                "get_category",
                &format!("SELECT {CATEGORY_COLUMNS} FROM user_categories WHERE user_id = ?1 AND id = ?2"),
                params![user_id, id.to_string()],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn find_category_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<UserCategory>, DatabaseError> {
        Ok(self
            .query_categories(
                "find_category_by_name",
                &format!("SELECT {CATEGORY_COLUMNS} FROM user_categories WHERE user_id = ?1 AND name = ?2"),
                params![user_id, name],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn list_categories(&self, user_id: &str) -> Result<Vec<UserCategory>, DatabaseError> {
        self.query_categories(
            "list_categories",
            &format!(
                "SELECT {CATEGORY_COLUMNS} FROM user_categories WHERE user_id = ?1 ORDER BY created_at DESC"
            ),
            params![user_id],
        )
        .await
    }

    async fn update_category(&self, category: &UserCategory) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE user_categories SET name = ?1, color = ?2, updated_at = ?3 WHERE id = ?4 AND user_id = ?5",
                params![
                    category.name.as_str(),
                    category.color.as_str(),
                    category.updated_at.to_rfc3339(),
                    category.id.to_string(),
                    category.user_id.as_str(),
                ],
            )
            .await
            .map_err(|e| write_error("update_category", e))?;
        Ok(())
    }

    async fn delete_category(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let deleted = conn
            .execute(
                "DELETE FROM user_categories WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_category: {e}")))?;
        if deleted == 0 {
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();
        let cleared = conn
            .execute(
                "UPDATE inbox_mails SET user_category_id = NULL, is_categorized = 0, updated_at = ?1 WHERE user_id = ?2 AND user_category_id = ?3",
                params![now, user_id, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_category clear mails: {e}")))?;

        info!(category_id = %id, mails_cleared = cleared, "Category deleted");
        Ok(true)
    }

    // ── Tasks ───────────────────────────────────────────────────────

    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
                params![
                    task.id.to_string(),
                    task.user_id.as_str(),
                    task.title.as_str(),
                    task.description.as_str(),
                    task.status.as_str(),
                    task.priority.as_str(),
                    opt_datetime(task.due_date),
                    to_json(&task.tags)?,
                    to_json(&task.related_links)?,
                    opt_text(task.source_message_id.as_deref()),
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("create_task", e))?;

        debug!(task_id = %task.id, "Task created");
        Ok(())
    }

    async fn get_task(&self, user_id: &str, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        Ok(self
            .query_tasks(
                "get_task",
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND id = ?2"),
                params![user_id, id.to_string()],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        self.query_tasks(
            "list_tasks",
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC"),
            params![user_id],
        )
        .await
    }

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE tasks SET title = ?1, description = ?2, status = ?3, priority = ?4, due_date = ?5, tags = ?6, related_links = ?7, updated_at = ?8 WHERE id = ?9 AND user_id = ?10",
                params![
                    task.title.as_str(),
                    task.description.as_str(),
                    task.status.as_str(),
                    task.priority.as_str(),
                    opt_datetime(task.due_date),
                    to_json(&task.tags)?,
                    to_json(&task.related_links)?,
                    task.updated_at.to_rfc3339(),
                    task.id.to_string(),
                    task.user_id.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_task: {e}")))?;
        Ok(())
    }

    async fn delete_task(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn()
            .execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_task: {e}")))?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{GmailCategory, NormalizedMail};
    use crate::tasks::{NewTask, TaskStatus};
    use chrono::Duration;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn link(user: &str, email: &str) -> LinkedAccount {
        LinkedAccount {
            user_id: user.into(),
            email: email.into(),
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
            token_expires_at: Some(Utc::now() + Duration::hours(1)),
            name: Some("Alice".into()),
            picture: None,
        }
    }

    fn mail(user: &str, account_id: Uuid, message_id: &str, date_secs: i64) -> InboxMail {
        InboxMail::from_normalized(
            user,
            account_id,
            NormalizedMail {
                message_id: message_id.into(),
                thread_id: Some(format!("t-{message_id}")),
                subject: format!("Subject {message_id}"),
                snippet: "snippet".into(),
                from: "Bob <bob@example.com>".into(),
                to: "alice@example.com".into(),
                sender_name: "Bob".into(),
                sender_email: "bob@example.com".into(),
                cc: vec!["c@example.com".into()],
                bcc: vec![],
                date: DateTime::from_timestamp(date_secs, 0),
                body: "hello".into(),
                attachments: vec![Attachment {
                    filename: "a.pdf".into(),
                    mime_type: "application/pdf".into(),
                    attachment_id: "att-1".into(),
                }],
                label_ids: vec!["INBOX".into(), "UNREAD".into()],
                is_unread: true,
                gmail_category: GmailCategory::Updates,
            },
            None,
        )
    }

    // ── Account tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn first_account_is_primary() {
        let db = test_db().await;
        let first = db.upsert_gmail_account(&link("u1", " Alice@Example.com ")).await.unwrap();
        let second = db.upsert_gmail_account(&link("u1", "work@example.com")).await.unwrap();

        assert_eq!(first.email, "alice@example.com");
        assert!(first.is_primary);
        assert!(!second.is_primary);

        let listed = db.list_gmail_accounts("u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn relinking_keeps_id_and_refresh_token() {
        let db = test_db().await;
        let first = db.upsert_gmail_account(&link("u1", "a@example.com")).await.unwrap();

        let mut again = link("u1", "A@example.com");
        again.access_token = "access-2".into();
        again.refresh_token = None;
        let second = db.upsert_gmail_account(&again).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token, "access-2");
        assert_eq!(second.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(db.list_gmail_accounts("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_email_for_different_users_is_separate() {
        let db = test_db().await;
        let a = db.upsert_gmail_account(&link("u1", "a@example.com")).await.unwrap();
        let b = db.upsert_gmail_account(&link("u2", "a@example.com")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.is_primary);
    }

    #[tokio::test]
    async fn update_tokens_keeps_refresh_when_absent() {
        let db = test_db().await;
        let account = db.upsert_gmail_account(&link("u1", "a@example.com")).await.unwrap();
        let expires = Utc::now() + Duration::hours(2);

        db.update_account_tokens(account.id, "fresh", None, Some(expires))
            .await
            .unwrap();
        let fetched = db.get_gmail_account(account.id).await.unwrap().unwrap();
        assert_eq!(fetched.access_token, "fresh");
        assert_eq!(fetched.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(
            fetched.token_expires_at.unwrap().timestamp(),
            expires.timestamp()
        );
    }

    #[tokio::test]
    async fn delete_account_removes_mail_and_promotes_next() {
        let db = test_db().await;
        let primary = db.upsert_gmail_account(&link("u1", "a@example.com")).await.unwrap();
        let other = db.upsert_gmail_account(&link("u1", "b@example.com")).await.unwrap();
        db.upsert_mail(&mail("u1", primary.id, "m1", 100)).await.unwrap();

        assert!(!db.delete_gmail_account("u2", primary.id).await.unwrap());
        assert!(db.delete_gmail_account("u1", primary.id).await.unwrap());

        assert!(db.get_mail("u1", "m1").await.unwrap().is_none());
        let promoted = db.get_gmail_account(other.id).await.unwrap().unwrap();
        assert!(promoted.is_primary);
    }

    // ── Mail tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn mail_round_trip() {
        let db = test_db().await;
        let account = Uuid::new_v4();
        db.upsert_mail(&mail("u1", account, "m1", 1_700_000_000)).await.unwrap();

        let fetched = db.get_mail("u1", "m1").await.unwrap().unwrap();
        assert_eq!(fetched.account_id, account);
        assert_eq!(fetched.cc, vec!["c@example.com".to_string()]);
        assert_eq!(fetched.attachments[0].attachment_id, "att-1");
        assert_eq!(fetched.gmail_category, GmailCategory::Updates);
        assert_eq!(fetched.date.unwrap().timestamp(), 1_700_000_000);
        assert!(fetched.is_unread);
        assert!(!fetched.is_categorized);

        assert!(db.get_mail("u2", "m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_preserves_category() {
        let db = test_db().await;
        let account = Uuid::new_v4();
        let category = Uuid::new_v4();
        db.upsert_mail(&mail("u1", account, "m1", 100)).await.unwrap();
        assert!(db.set_mail_category("u1", "m1", Some(category)).await.unwrap());

        let mut updated = mail("u1", account, "m1", 100);
        updated.subject = "Changed".into();
        db.upsert_mail(&updated).await.unwrap();

        let fetched = db.get_mail("u1", "m1").await.unwrap().unwrap();
        assert_eq!(fetched.subject, "Changed");
        assert_eq!(fetched.user_category_id, Some(category));
        assert!(fetched.is_categorized);
    }

    #[tokio::test]
    async fn account_mails_sorted_newest_first_with_limit() {
        let db = test_db().await;
        let account = Uuid::new_v4();
        db.upsert_mail(&mail("u1", account, "old", 100)).await.unwrap();
        db.upsert_mail(&mail("u1", account, "new", 300)).await.unwrap();
        db.upsert_mail(&mail("u1", account, "mid", 200)).await.unwrap();
        db.upsert_mail(&mail("u1", Uuid::new_v4(), "elsewhere", 400)).await.unwrap();

        let mails = db.list_account_mails(account, Some(2)).await.unwrap();
        let ids: Vec<_> = mails.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(db.list_account_mails(account, None).await.unwrap().len(), 3);

        let all = db.list_user_mails("u1").await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].message_id, "elsewhere");
    }

    #[tokio::test]
    async fn mail_dates_stored_as_rfc3339_text() {
        let db = test_db().await;
        let account = Uuid::new_v4();
        let mut with_millis = mail("u1", account, "later", 1_700_000_000);
        with_millis.date = DateTime::from_timestamp_millis(1_700_000_000_500);
        db.upsert_mail(&with_millis).await.unwrap();
        db.upsert_mail(&mail("u1", account, "exact", 1_700_000_000)).await.unwrap();
        db.upsert_mail(&mail("u1", account, "older", 999_999_999)).await.unwrap();
        let mut undated = mail("u1", account, "undated", 0);
        undated.date = None;
        db.upsert_mail(&undated).await.unwrap();

        let mut rows = db
            .conn()
            .query(
                "SELECT date FROM inbox_mails WHERE message_id = ?1",
                params!["exact"],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let raw: String = row.get(0).unwrap();
        assert_eq!(raw, "2023-11-14T22:13:20.000Z");

        let ids: Vec<_> = db
            .list_account_mails(account, None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.message_id)
            .collect();
        assert_eq!(ids, vec!["later", "exact", "older", "undated"]);
        let later = db.get_mail("u1", "later").await.unwrap().unwrap();
        assert_eq!(later.date.unwrap().timestamp_millis(), 1_700_000_000_500);
    }

    #[tokio::test]
    async fn row_errors_fail_the_query() {
        let db = test_db().await;
        db.upsert_mail(&mail("u1", Uuid::new_v4(), "m1", 100)).await.unwrap();

        // abs() of i64::MIN overflows while SQLite steps through rows.
        let result = db
            .query_mails(
                "overflow",
                &format!("SELECT {MAIL_COLUMNS} FROM inbox_mails WHERE abs(?1) > 0"),
                params![i64::MIN],
            )
            .await;
        assert!(matches!(result, Err(DatabaseError::Query(_))));
    }

    #[tokio::test]
    async fn clearing_category_resets_flag() {
        let db = test_db().await;
        db.upsert_mail(&mail("u1", Uuid::new_v4(), "m1", 100)).await.unwrap();
        db.set_mail_category("u1", "m1", Some(Uuid::new_v4())).await.unwrap();
        db.set_mail_category("u1", "m1", None).await.unwrap();

        let fetched = db.get_mail("u1", "m1").await.unwrap().unwrap();
        assert!(fetched.user_category_id.is_none());
        assert!(!fetched.is_categorized);
        assert!(!db.set_mail_category("u1", "missing", None).await.unwrap());
    }

    #[tokio::test]
    async fn mark_read_drops_unread_label() {
        let db = test_db().await;
        db.upsert_mail(&mail("u1", Uuid::new_v4(), "m1", 100)).await.unwrap();
        assert!(db.mark_mail_read("u1", "m1").await.unwrap());

        let fetched = db.get_mail("u1", "m1").await.unwrap().unwrap();
        assert!(!fetched.is_unread);
        assert_eq!(fetched.label_ids, vec!["INBOX".to_string()]);
    }

    // ── Category tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn category_names_unique_per_user() {
        let db = test_db().await;
        db.create_category(&UserCategory::new("u1", "Work", CategoryColor::Red))
            .await
            .unwrap();
        let dup = db
            .create_category(&UserCategory::new("u1", "Work", CategoryColor::Blue))
            .await;
        assert!(matches!(dup, Err(DatabaseError::Constraint(_))));

        db.create_category(&UserCategory::new("u2", "Work", CategoryColor::Blue))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn category_lookup_and_listing() {
        let db = test_db().await;
        let work = UserCategory::new("u1", "Work", CategoryColor::Red);
        db.create_category(&work).await.unwrap();
        let mut personal = UserCategory::new("u1", "Personal", CategoryColor::Teal);
        personal.created_at = work.created_at + Duration::seconds(1);
        db.create_category(&personal).await.unwrap();

        let found = db.find_category_by_name("u1", "Work").await.unwrap().unwrap();
        assert_eq!(found.id, work.id);
        assert!(db.get_category("u2", work.id).await.unwrap().is_none());

        let listed = db.list_categories("u1").await.unwrap();
        assert_eq!(listed[0].name, "Personal");
        assert_eq!(listed[1].color, CategoryColor::Red);
    }

    #[tokio::test]
    async fn rename_onto_existing_name_conflicts() {
        let db = test_db().await;
        db.create_category(&UserCategory::new("u1", "Work", CategoryColor::Red))
            .await
            .unwrap();
        let mut other = UserCategory::new("u1", "Home", CategoryColor::Red);
        db.create_category(&other).await.unwrap();

        other.name = "Work".into();
        assert!(matches!(
            db.update_category(&other).await,
            Err(DatabaseError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn deleting_category_clears_mail() {
        let db = test_db().await;
        let cat = UserCategory::new("u1", "Work", CategoryColor::Red);
        db.create_category(&cat).await.unwrap();
        db.upsert_mail(&mail("u1", Uuid::new_v4(), "m1", 100)).await.unwrap();
        db.set_mail_category("u1", "m1", Some(cat.id)).await.unwrap();

        assert!(db.delete_category("u1", cat.id).await.unwrap());
        assert!(!db.delete_category("u1", cat.id).await.unwrap());

        let fetched = db.get_mail("u1", "m1").await.unwrap().unwrap();
        assert!(fetched.user_category_id.is_none());
        assert!(!fetched.is_categorized);
    }

    // ── Task tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn task_crud() {
        let db = test_db().await;
        let task = NewTask {
            title: Some("Review contract".into()),
            due_date: Some("2025-06-01".into()),
            tags: vec!["legal".into()],
            related_links: vec!["https://example.com/doc".into()],
            ..Default::default()
        }
        .into_task("u1")
        .unwrap();
        db.create_task(&task).await.unwrap();

        let mut fetched = db.get_task("u1", task.id).await.unwrap().unwrap();
        assert_eq!(fetched.tags, vec!["legal".to_string()]);
        assert_eq!(fetched.due_date, task.due_date);
        assert!(db.get_task("u2", task.id).await.unwrap().is_none());

        fetched.status = TaskStatus::Review;
        db.update_task(&fetched).await.unwrap();
        let listed = db.list_tasks("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, TaskStatus::Review);

        assert!(!db.delete_task("u2", task.id).await.unwrap());
        assert!(db.delete_task("u1", task.id).await.unwrap());
        assert!(db.list_tasks("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inbox.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.create_category(&UserCategory::new("u1", "Work", CategoryColor::Red))
                .await
                .unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.list_categories("u1").await.unwrap().len(), 1);
    }
}
