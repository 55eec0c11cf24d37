//! Gmail account data model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A Gmail account linked to a dashboard user.
///
/// Holds live OAuth tokens; never serialize this into API responses
/// (use [`AccountSummary`]).
#[derive(Clone)]
pub struct GmailAccount {
    pub id: Uuid,
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GmailAccount {
    /// Whether the access token expires within `margin` of `now`.
    /// A missing expiry counts as expired.
    pub fn expires_within(&self, margin: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.token_expires_at {
            Some(expires_at) => expires_at - now < margin,
            None => true,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
            is_primary: self.is_primary,
            token_expires_at: self.token_expires_at,
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for GmailAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[redacted]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_expires_at", &self.token_expires_at)
            .field("is_primary", &self.is_primary)
            .finish()
    }
}

/// Account fields safe to return to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub is_primary: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of a completed OAuth consent, ready to be upserted.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl LinkedAccount {
    /// Normalize the address the way accounts are keyed: trimmed, lowercase.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}
