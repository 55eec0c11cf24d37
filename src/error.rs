//! Error types for Inbox Hub.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Google API error: {0}")]
    Google(#[from] GoogleError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures talking to Google's OAuth, Gmail, and People endpoints.
#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    #[error("Google rejected the access token")]
    Unauthorized,

    #[error("Google resource not found: {0}")]
    NotFound(String),

    #[error("Google API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode Google response: {0}")]
    Decode(String),

    #[error("Invalid Google API URL: {0}")]
    InvalidUrl(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outgoing message construction errors.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("At least one recipient is required")]
    NoRecipients,

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid content type {content_type} for attachment {filename}")]
    InvalidContentType {
        filename: String,
        content_type: String,
    },

    #[error("Failed to build message: {0}")]
    Build(String),
}

/// User input that fails a domain rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("All the related links must be valid URLs")]
    InvalidLink(String),

    #[error("{0}")]
    Invalid(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
