//! Configuration types, built from environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default number of messages listed per inbox sync.
pub const DEFAULT_SYNC_BATCH: u32 = 50;

/// Google OAuth client registration.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Base URL of the dashboard UI (OAuth callback redirects to `{base_url}/dashboard`).
    pub base_url: String,
    /// Session token → user id.
    pub session_tokens: HashMap<String, String>,
    /// Messages listed per inbox sync.
    pub sync_batch: u32,
    /// Optional directory for rolling log files.
    pub log_dir: Option<PathBuf>,
    pub google: GoogleConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_env("INBOX_HUB_PORT", 8080u16)?;
        let db_path = PathBuf::from(
            std::env::var("INBOX_HUB_DB_PATH").unwrap_or_else(|_| "./data/inbox-hub.db".into()),
        );
        let base_url = std::env::var("INBOX_HUB_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        let session_tokens =
            parse_session_tokens(&std::env::var("INBOX_HUB_SESSION_TOKENS").unwrap_or_default())?;
        let sync_batch = parse_env("INBOX_HUB_SYNC_BATCH", DEFAULT_SYNC_BATCH)?;
        let log_dir = std::env::var("INBOX_HUB_LOG_DIR").ok().map(PathBuf::from);

        let google = GoogleConfig {
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: SecretString::from(required("GOOGLE_CLIENT_SECRET")?),
            redirect_uri: required("GOOGLE_REDIRECT_URI")?,
        };

        let backend: LlmBackend = std::env::var("LLM_BACKEND")
            .unwrap_or_else(|_| "gemini".into())
            .parse()
            .map_err(|message| ConfigError::InvalidValue {
                key: "LLM_BACKEND".into(),
                message,
            })?;
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| ConfigError::MissingEnvVar("LLM_API_KEY".into()))?;
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| backend.default_model().into());

        Ok(Self {
            port,
            db_path,
            base_url,
            session_tokens,
            sync_batch,
            log_dir,
            google,
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse `token:user_id` pairs separated by commas.
pub fn parse_session_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((token, user)) = pair.split_once(':') else {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_HUB_SESSION_TOKENS".into(),
                message: format!("expected token:user_id, got {pair:?}"),
            });
        };
        let (token, user) = (token.trim(), user.trim());
        if token.is_empty() || user.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_HUB_SESSION_TOKENS".into(),
                message: format!("empty token or user in {pair:?}"),
            });
        }
        tokens.insert(token.to_string(), user.to_string());
    }
    Ok(tokens)
}
