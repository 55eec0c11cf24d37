//! Google account linking: consent redirect and OAuth callback.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::{AppState, AuthUser};
use crate::accounts::LinkedAccount;

/// How long a consent round-trip may take.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// One-time `state` nonces bound to the user who started consent.
pub struct OAuthStates {
    ttl: Duration,
    pending: RwLock<HashMap<String, (String, Instant)>>,
}

impl OAuthStates {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a nonce for `user_id`, dropping any expired ones.
    pub async fn issue(&self, user_id: &str) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        let mut pending = self.pending.write().await;
        pending.retain(|_, (_, issued)| issued.elapsed() < self.ttl);
        pending.insert(nonce.clone(), (user_id.to_string(), Instant::now()));
        nonce
    }

    /// Consume a nonce. Unknown, reused, or expired nonces yield `None`.
    pub async fn redeem(&self, nonce: &str) -> Option<String> {
        let (user_id, issued) = self.pending.write().await.remove(nonce)?;
        (issued.elapsed() < self.ttl).then_some(user_id)
    }
}

impl Default for OAuthStates {
    fn default() -> Self {
        Self::new(STATE_TTL)
    }
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// GET /api/auth/google
pub(super) async fn start_consent(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Response {
    let nonce = state.oauth_states.issue(&user_id).await;
    found(&state.oauth.authorization_url(&nonce))
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

/// GET /api/auth/google/callback
pub(super) async fn consent_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let (Some(code), Some(nonce)) = (
        params.code.filter(|c| !c.is_empty()),
        params.state.filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Missing code or state".into()));
    };

    let Some(user_id) = state.oauth_states.redeem(&nonce).await else {
        warn!("OAuth callback with unknown or expired state");
        return Err(ApiError::Unauthorized("Invalid or expired state".into()));
    };

    let grant = state.oauth.exchange_code(&code).await?;
    let profile = state.oauth.user_profile(&grant.access_token).await?;

    let account = state
        .db
        .upsert_gmail_account(&LinkedAccount {
            user_id,
            email: profile.email,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_expires_at: grant.expires_at,
            name: profile.name,
            picture: profile.picture,
        })
        .await?;
    info!(account_id = %account.id, email = %account.email, "Gmail account linked");

    Ok(found(&format!("{}/dashboard", state.base_url)))
}
