use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::DurationProbe;
use crate::auth::SessionStore;
use crate::database::DatabaseManager;
use crate::pipeline::StreamingPipeline;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub sessions: Arc<SessionStore>,
    pub pipeline: Arc<StreamingPipeline>,
    pub probe: Arc<dyn DurationProbe>,
    /// Where uploads are kept permanently.
    pub audio_storage: PathBuf,
}
