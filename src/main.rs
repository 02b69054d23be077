use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eidolon::chatlog::ChatLog;
use eidolon::config::Config;
use eidolon::provider::select_provider;
use eidolon::speech::Synthesizer;
use eidolon::AppState;

#[derive(Parser, Debug)]
#[command(name = "eidolon")]
#[command(author, version, about = "A persona conversation backend with pluggable AI providers", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "eidolon.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration (file values, then environment overrides)
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Eidolon v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.server.data_dir.display()
        )
    })?;

    // Primary database (users, personas)
    let db = eidolon::db::init(&config.server.data_dir).await?;

    // Conversation log store; the service runs degraded if it is down
    let chatlog = ChatLog::connect(&config.chatlog, &config.server.data_dir).await;

    // AI provider, fixed for the process lifetime
    let provider = select_provider(&config.ai);
    tracing::info!(provider = %provider.name(), "AI provider selected");

    let speech = Synthesizer::new(&config.speech);
    if !speech.is_configured() {
        tracing::info!("Speech synthesis not configured, TTS will fall back to the client");
    }

    let state = Arc::new(AppState::new(config.clone(), db, chatlog, provider, speech));
    let app = eidolon::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
