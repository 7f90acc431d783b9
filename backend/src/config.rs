use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::audio::DEFAULT_CHUNK_SECONDS;

/// Runtime configuration. Every option can also be supplied through its
/// environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "transcription-portal", version, about = "Streaming speech-to-text portal")]
pub struct Config {
    /// Interface to bind the HTTP listener on
    #[arg(long, env = "PORTAL_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORTAL_PORT", default_value_t = 5610)]
    pub port: u16,

    /// SQLite database file (created on first start)
    #[arg(long, env = "PORTAL_DATABASE_PATH", default_value = "data.db")]
    pub database_path: PathBuf,

    /// Directory where uploaded audio files are kept
    #[arg(long, env = "PORTAL_AUDIO_STORAGE", default_value = "stored_audio")]
    pub audio_storage: PathBuf,

    /// Parent directory of the per-run chunk directories
    #[arg(long, env = "PORTAL_SCRATCH_ROOT", default_value = "temp_audio_input")]
    pub scratch_root: PathBuf,

    /// Whisper ggml model file
    #[arg(long, env = "PORTAL_MODEL_PATH", default_value = "models/ggml-small.bin")]
    pub model_path: PathBuf,

    /// Duration of one recognition chunk, in seconds
    #[arg(long, env = "PORTAL_CHUNK_SECONDS", default_value_t = DEFAULT_CHUNK_SECONDS,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk_seconds: u32,

    #[arg(long, env = "PORTAL_MAX_UPLOAD_MB", default_value_t = 512)]
    pub max_upload_mb: usize,

    #[arg(long, env = "PORTAL_TOKEN_TTL_HOURS", default_value_t = 12)]
    pub token_ttl_hours: u64,

    #[arg(long, env = "PORTAL_ADMIN_LOGIN", default_value = "admin@tunisienumerique.tn")]
    pub admin_login: String,

    /// Password for the seeded admin account. When absent and the admin does
    /// not exist yet, a random one is generated and logged once.
    #[arg(long, env = "PORTAL_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    #[arg(long, env = "PORTAL_FFMPEG")]
    pub ffmpeg_path: Option<PathBuf>,

    #[arg(long, env = "PORTAL_FFPROBE")]
    pub ffprobe_path: Option<PathBuf>,
}

impl Config {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}:{}: {}", self.host, self.port, e))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(60 * 60))
    }
}
