//! Google API clients: OAuth2, Gmail, and People.
//!
//! Each service sits behind a trait so the pipeline and handlers can be
//! driven by in-process fakes in tests.

pub mod gmail;
pub mod oauth;
pub mod people;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use gmail::GmailClient;
pub use oauth::{GoogleOAuth, OAUTH_SCOPES};
pub use people::PeopleClient;
pub use types::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GoogleError;

/// Access/refresh tokens issued by Google's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Only present on first consent (or when Google rotates it).
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Basic profile of the Google account that granted consent.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent URL carrying `state`.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, GoogleError>;

    async fn user_profile(&self, access_token: &str) -> Result<GoogleProfile, GoogleError>;
}

#[async_trait]
pub trait GmailApi: Send + Sync {
    /// Ids of the newest `max_results` inbox messages.
    async fn list_messages(
        &self,
        access_token: &str,
        max_results: u32,
    ) -> Result<Vec<MessageRef>, GoogleError>;

    /// Full message (`format=full`).
    async fn get_message(&self, access_token: &str, id: &str) -> Result<GmailMessage, GoogleError>;

    /// Decoded attachment bytes.
    async fn get_attachment(
        &self,
        access_token: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, GoogleError>;

    async fn modify_labels(
        &self,
        access_token: &str,
        id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<(), GoogleError>;

    /// Send an RFC 5322 message encoded as base64url. Returns the new message id.
    async fn send_raw(&self, access_token: &str, raw: &str) -> Result<String, GoogleError>;
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Photo URL of the first contact matching `email`, if any.
    async fn photo_url(&self, access_token: &str, email: &str)
    -> Result<Option<String>, GoogleError>;
}

/// Turn a non-success response into the matching `GoogleError`.
pub(crate) async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, GoogleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), what, "Google API call failed");
    match status {
        reqwest::StatusCode::UNAUTHORIZED => Err(GoogleError::Unauthorized),
        reqwest::StatusCode::NOT_FOUND => Err(GoogleError::NotFound(what.to_string())),
        _ => Err(GoogleError::Api {
            status: status.as_u16(),
            body,
        }),
    }
}
