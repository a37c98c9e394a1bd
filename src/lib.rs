pub mod auth;
pub mod config;
pub mod db;
pub mod llm;
pub mod markdown;
pub mod preview;
pub mod prompts;
pub mod publish;
pub mod routes;
pub mod session;
pub mod typewriter;

use config::{Config, ConfigError};
use db::Database;
use routes::AppState;
use session::SessionStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to initialize database: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("probsolver=info")),
        )
        .init();

    let config = Config::from_env()?;
    let database = Database::new(&config.data_dir)?;
    let shutdown = CancellationToken::new();

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(
        addr = %config.addr,
        data_dir = %config.data_dir.display(),
        provider = ?config.provider,
        "ProbSolver listening"
    );

    let state = AppState {
        db: Arc::new(database),
        sessions: Arc::new(SessionStore::new()),
        config: Arc::new(config),
        shutdown: shutdown.clone(),
    };

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            signal.cancel();
        }
    });

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
