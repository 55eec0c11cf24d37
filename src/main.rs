use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use inbox_hub::ai::GeneratorConfig;
use inbox_hub::api::{self, AppDeps, AppState, StaticTokenAuthenticator};
use inbox_hub::config::AppConfig;
use inbox_hub::google::{GmailClient, GoogleOAuth, PeopleClient};
use inbox_hub::llm::create_provider;
use inbox_hub::store::{Database, LibSqlBackend};

/// Stderr logging, plus a daily rolling file when `log_dir` is set. The
/// returned guard must live as long as the process to flush the file writer.
fn init_tracing(log_dir: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "inbox-hub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(filter()),
        )
        .with(file_layer)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context(
        "invalid configuration (required: GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, GOOGLE_REDIRECT_URI, LLM_API_KEY)",
    )?;
    let _log_guard = init_tracing(config.log_dir.as_deref()).context("failed to set up logging")?;

    eprintln!("📬 Inbox Hub v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({:?})", config.llm.model, config.llm.backend);
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);
    eprintln!("   Database: {}", config.db_path.display());

    if config.session_tokens.is_empty() {
        tracing::warn!("INBOX_HUB_SESSION_TOKENS is empty; every API call will be rejected");
    }

    let llm = create_provider(&config.llm).context("failed to create LLM provider")?;

    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    let http = reqwest::Client::new();
    let state = AppState::new(AppDeps {
        db,
        gmail: Arc::new(GmailClient::new(http.clone())),
        contacts: Arc::new(PeopleClient::new(http.clone())),
        oauth: Arc::new(GoogleOAuth::new(config.google.clone(), http)),
        auth: Arc::new(StaticTokenAuthenticator::new(config.session_tokens.clone())),
        llm,
        base_url: config.base_url.clone(),
        sync_batch: config.sync_batch,
        generator: GeneratorConfig::default(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "Inbox Hub API listening");
    axum::serve(listener, api::router(state)).await?;

    Ok(())
}
