//! Access-token freshness for linked accounts.

use chrono::{Duration, Utc};
use tracing::info;

use super::model::GmailAccount;
use crate::error::Error;
use crate::google::OAuthProvider;
use crate::store::Database;

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Return `account` with a usable access token.
///
/// Refreshes only when the token is near expiry *and* a refresh token is on
/// file; otherwise the account is returned as-is and Gmail decides.
pub async fn ensure_fresh(
    db: &dyn Database,
    oauth: &dyn OAuthProvider,
    account: GmailAccount,
) -> Result<GmailAccount, Error> {
    let margin = Duration::minutes(REFRESH_MARGIN_MINUTES);
    let Some(refresh_token) = account.refresh_token.clone() else {
        return Ok(account);
    };
    if !account.expires_within(margin, Utc::now()) {
        return Ok(account);
    }

    let grant = oauth.refresh(&refresh_token).await?;
    db.update_account_tokens(
        account.id,
        &grant.access_token,
        grant.refresh_token.as_deref(),
        grant.expires_at,
    )
    .await?;
    info!(account_id = %account.id, email = %account.email, "Access token refreshed");

    Ok(GmailAccount {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token.or(account.refresh_token.clone()),
        token_expires_at: grant.expires_at,
        updated_at: Utc::now(),
        ..account
    })
}
