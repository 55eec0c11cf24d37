//! Session authentication for API routes.
//!
//! Sessions are issued elsewhere; this service only resolves an opaque
//! token (from the `token` cookie or an `Authorization: Bearer` header) to
//! a user id.

use std::collections::HashMap;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;

use super::AppState;
use super::error::ApiError;

/// Resolves session tokens to user ids.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Fixed token → user table loaded from configuration.
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// The authenticated caller's user id.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;
        state
            .auth
            .authenticate(&token)
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".into()))
    }
}

/// Bearer header wins over the cookie.
fn session_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
        && let Some(token) = value.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == "token" && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/task");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn token_from_cookie() {
        let p = parts(&[("cookie", "theme=dark; token=abc123; other=1")]);
        assert_eq!(session_token(&p).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let p = parts(&[("authorization", "Bearer xyz"), ("cookie", "token=abc")]);
        assert_eq!(session_token(&p).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_empty_token() {
        assert!(session_token(&parts(&[])).is_none());
        assert!(session_token(&parts(&[("cookie", "token=")])).is_none());
        assert!(session_token(&parts(&[("authorization", "Basic Zm9v")])).is_none());
    }

    #[test]
    fn static_tokens_resolve_users() {
        let auth = StaticTokenAuthenticator::new(HashMap::from([("t1".to_string(), "alice".to_string())]));
        assert_eq!(auth.authenticate("t1").as_deref(), Some("alice"));
        assert!(auth.authenticate("t2").is_none());
    }
}
