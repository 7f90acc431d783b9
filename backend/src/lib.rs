pub mod api;
pub mod audio;
pub mod auth;
pub mod config;
pub mod database;
pub mod pipeline;
pub mod startup;
pub mod state;
pub mod transcription;
pub mod utils;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use log::{error, info};
use tokio::net::TcpListener;

pub use config::Config;

/// Initialize the service and serve until Ctrl+C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = startup::initialize(&config).await?;
    let db = state.db.clone();
    let purge = startup::spawn_session_purge(state.sessions.clone());

    let app = api::router(state, config.max_upload_bytes());
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Transcription portal listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        })
        .await;

    purge.abort();
    if let Err(e) = db.cleanup().await {
        error!("Failed to close database cleanly: {}", e);
    }
    served.context("Server error")?;

    info!("Transcription portal stopped");
    Ok(())
}
