//! Mail data model: normalized Gmail messages and their mirrored rows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gmail's own inbox tab for a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GmailCategory {
    #[default]
    Primary,
    Social,
    Promotions,
    Updates,
    Forums,
}

impl GmailCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GmailCategory::Primary => "primary",
            GmailCategory::Social => "social",
            GmailCategory::Promotions => "promotions",
            GmailCategory::Updates => "updates",
            GmailCategory::Forums => "forums",
        }
    }

    /// Derive the tab from Gmail label ids. Checked in a fixed order:
    /// promotions, social, updates, forums, else primary.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let has = |label: &str| labels.iter().any(|l| l.as_ref() == label);
        if has("CATEGORY_PROMOTIONS") {
            GmailCategory::Promotions
        } else if has("CATEGORY_SOCIAL") {
            GmailCategory::Social
        } else if has("CATEGORY_UPDATES") {
            GmailCategory::Updates
        } else if has("CATEGORY_FORUMS") {
            GmailCategory::Forums
        } else {
            GmailCategory::Primary
        }
    }
}

impl fmt::Display for GmailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GmailCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(GmailCategory::Primary),
            "social" => Ok(GmailCategory::Social),
            "promotions" => Ok(GmailCategory::Promotions),
            "updates" => Ok(GmailCategory::Updates),
            "forums" => Ok(GmailCategory::Forums),
            other => Err(format!("unknown gmail category: {other}")),
        }
    }
}

/// Attachment metadata; the bytes stay in Gmail until downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub attachment_id: String,
}

/// A Gmail message flattened into the fields the dashboard uses.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMail {
    pub message_id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub snippet: String,
    /// Raw `From` header.
    pub from: String,
    /// Raw `To` header.
    pub to: String,
    pub sender_name: String,
    pub sender_email: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub label_ids: Vec<String>,
    pub is_unread: bool,
    pub gmail_category: GmailCategory,
}

/// A mirrored inbox message, unique per `(message_id, user_id)`.
#[derive(Debug, Clone, Serialize)]
pub struct InboxMail {
    pub id: Uuid,
    pub message_id: String,
    pub user_id: String,
    pub account_id: Uuid,
    pub thread_id: Option<String>,
    pub subject: String,
    pub snippet: String,
    pub from: String,
    pub to: String,
    pub sender_name: String,
    pub sender_email: String,
    pub sender_picture: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub label_ids: Vec<String>,
    pub is_unread: bool,
    pub gmail_category: GmailCategory,
    pub user_category_id: Option<Uuid>,
    pub is_categorized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InboxMail {
    /// Build a fresh, uncategorized row from a normalized message.
    pub fn from_normalized(
        user_id: &str,
        account_id: Uuid,
        mail: NormalizedMail,
        sender_picture: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            message_id: mail.message_id,
            user_id: user_id.to_string(),
            account_id,
            thread_id: mail.thread_id,
            subject: mail.subject,
            snippet: mail.snippet,
            from: mail.from,
            to: mail.to,
            sender_name: mail.sender_name,
            sender_email: mail.sender_email,
            sender_picture,
            cc: mail.cc,
            bcc: mail.bcc,
            date: mail.date,
            body: mail.body,
            attachments: mail.attachments,
            label_ids: mail.label_ids,
            is_unread: mail.is_unread,
            gmail_category: mail.gmail_category,
            user_category_id: None,
            is_categorized: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_label_precedence() {
        assert_eq!(
            GmailCategory::from_labels(&["INBOX", "CATEGORY_SOCIAL", "CATEGORY_PROMOTIONS"]),
            GmailCategory::Promotions
        );
        assert_eq!(
            GmailCategory::from_labels(&["CATEGORY_FORUMS", "CATEGORY_UPDATES"]),
            GmailCategory::Updates
        );
        assert_eq!(GmailCategory::from_labels(&["INBOX"]), GmailCategory::Primary);
        let empty: [&str; 0] = [];
        assert_eq!(GmailCategory::from_labels(&empty), GmailCategory::Primary);
    }

    #[test]
    fn category_string_forms() {
        assert_eq!("forums".parse::<GmailCategory>().unwrap(), GmailCategory::Forums);
        assert_eq!(GmailCategory::Social.to_string(), "social");
        assert_eq!(
            serde_json::to_string(&GmailCategory::Promotions).unwrap(),
            "\"promotions\""
        );
    }
}
