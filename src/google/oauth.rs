//! OAuth 2.0 flow for linking Gmail accounts.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info};

use super::{GoogleProfile, OAuthProvider, TokenGrant, check_status};
use crate::config::GoogleConfig;
use crate::error::GoogleError;

/// Scopes requested on consent.
pub const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/contacts.readonly",
];

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Response from Google token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl From<TokenResponse> for TokenGrant {
    fn from(t: TokenResponse) -> Self {
        TokenGrant {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_at: t.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// reqwest-backed Google OAuth client.
pub struct GoogleOAuth {
    config: GoogleConfig,
    client: Client,
    token_url: String,
    userinfo_url: String,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig, client: Client) -> Self {
        Self {
            config,
            client,
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    /// Point token and userinfo calls at another host.
    pub fn with_endpoints(mut self, token_url: impl Into<String>, userinfo_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.userinfo_url = userinfo_url.into();
        self
    }

    async fn token_request(&self, params: &[(&str, &str)], what: &str) -> Result<TokenGrant, GoogleError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleError::OAuth(format!("{what} failed: {status} - {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(format!("token response: {e}")))?;
        Ok(token.into())
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn authorization_url(&self, state: &str) -> String {
        let scopes = OAUTH_SCOPES.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scopes.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ];
        match url::Url::parse_with_params(AUTH_URL, &params) {
            Ok(url) => url.to_string(),
            Err(_) => AUTH_URL.to_string(),
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError> {
        info!("Exchanging authorization code for tokens");
        let secret = self.config.client_secret.expose_secret();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let grant = self.token_request(&params, "Token exchange").await?;
        debug!(has_refresh = grant.refresh_token.is_some(), "Token exchange successful");
        Ok(grant)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, GoogleError> {
        let secret = self.config.client_secret.expose_secret();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.token_request(&params, "Token refresh").await
    }

    async fn user_profile(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response, "userinfo").await?;
        response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(format!("userinfo: {e}")))
    }
}
