use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::audio::{resolve_tool, FfmpegSegmenter, FfprobeDurationProbe};
use crate::auth::SessionStore;
use crate::config::Config;
use crate::database::setup::ensure_default_admin;
use crate::database::DatabaseManager;
use crate::pipeline::StreamingPipeline;
use crate::state::AppState;
use crate::transcription::TranscriptionProvider;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Prepare everything the service needs before the listener is bound.
pub async fn initialize(config: &Config) -> Result<AppState> {
    for dir in [&config.audio_storage, &config.scratch_root] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let db = DatabaseManager::new(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    if let Some(password) =
        ensure_default_admin(&db, &config.admin_login, config.admin_password.as_deref())
            .await
            .context("Failed to seed the default admin account")?
    {
        warn!("Generated password for '{}': {}", config.admin_login, password);
    }

    let ffmpeg = resolve_tool(config.ffmpeg_path.as_deref(), "ffmpeg");
    let ffprobe = resolve_tool(config.ffprobe_path.as_deref(), "ffprobe");
    info!("Using ffmpeg at {} and ffprobe at {}", ffmpeg.display(), ffprobe.display());

    let provider = load_provider(&config.model_path).await?;
    info!("Speech recognition ready ({})", provider.provider_name());

    let pipeline = StreamingPipeline::new(
        Arc::new(FfmpegSegmenter::new(ffmpeg)),
        provider,
        db.clone(),
        config.scratch_root.clone(),
        config.chunk_seconds,
    );

    Ok(AppState {
        db,
        sessions: Arc::new(SessionStore::new(config.token_ttl())),
        pipeline: Arc::new(pipeline),
        probe: Arc::new(FfprobeDurationProbe::new(ffprobe)),
        audio_storage: config.audio_storage.clone(),
    })
}

#[cfg(feature = "whisper")]
async fn load_provider(model_path: &Path) -> Result<Arc<dyn TranscriptionProvider>> {
    use crate::transcription::WhisperProvider;

    let path = model_path.to_path_buf();
    let provider = tokio::task::spawn_blocking(move || WhisperProvider::load(&path))
        .await
        .context("Model loading task failed")?
        .with_context(|| format!("Failed to load Whisper model {}", model_path.display()))?;
    info!("Loaded Whisper model '{}'", provider.model_name());
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "whisper"))]
async fn load_provider(model_path: &Path) -> Result<Arc<dyn TranscriptionProvider>> {
    anyhow::bail!(
        "Cannot load {}: built without the `whisper` feature",
        model_path.display()
    )
}

/// Drop expired bearer tokens periodically so the table stays small.
pub fn spawn_session_purge(sessions: Arc<SessionStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                info!("Purged {} expired session(s), {} still active", purged, sessions.len());
            } else if !sessions.is_empty() {
                debug!("{} active session(s)", sessions.len());
            }
        }
    })
}
