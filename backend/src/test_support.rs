// Fixtures shared by unit and HTTP tests: WAV generation, tool detection and
// stub implementations of the pipeline capabilities.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::router;
use crate::audio::{collect_chunks, AudioSegmenter, Chunk, DurationProbe, SegmentationError, CHUNK_SAMPLE_RATE};
use crate::auth::{hash_password, SessionStore};
use crate::database::models::NewUser;
use crate::database::repositories::{TranscriptsRepository, UsersRepository};
use crate::database::DatabaseManager;
use crate::pipeline::StreamingPipeline;
use crate::state::AppState;
use crate::transcription::{TranscriptionError, TranscriptionProvider};

/// Write `secs` seconds of mono 16-bit silence.
pub fn write_silence_wav(dir: &Path, name: &str, secs: f32, sample_rate: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let samples = (secs * sample_rate as f32).round() as usize;
    for _ in 0..samples {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

pub fn ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok()
}

pub fn ffprobe_available() -> bool {
    which::which("ffprobe").is_ok()
}

/// Entries left under a scratch root; empty when the root does not exist.
pub fn scratch_entries(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Writes `count` short chunk files, the way ffmpeg would.
pub struct StubSegmenter {
    count: usize,
}

impl StubSegmenter {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

#[async_trait]
impl AudioSegmenter for StubSegmenter {
    async fn segment(
        &self,
        _source: &Path,
        _chunk_seconds: u32,
        scratch: &Path,
    ) -> Result<Vec<Chunk>, SegmentationError> {
        for i in 0..self.count {
            write_silence_wav(scratch, &format!("chunk_{:03}.wav", i), 0.1, CHUNK_SAMPLE_RATE);
        }
        Ok(collect_chunks(scratch)?)
    }
}

enum SegmenterFailure {
    ExitCode(i32),
    MissingTool,
}

/// Segmenter that leaves a partial chunk behind and then fails.
pub struct FailingSegmenter {
    failure: SegmenterFailure,
}

impl FailingSegmenter {
    pub fn exit_code(code: i32) -> Self {
        Self {
            failure: SegmenterFailure::ExitCode(code),
        }
    }

    pub fn missing_tool() -> Self {
        Self {
            failure: SegmenterFailure::MissingTool,
        }
    }
}

#[async_trait]
impl AudioSegmenter for FailingSegmenter {
    async fn segment(
        &self,
        _source: &Path,
        _chunk_seconds: u32,
        scratch: &Path,
    ) -> Result<Vec<Chunk>, SegmentationError> {
        match self.failure {
            SegmenterFailure::ExitCode(code) => {
                write_silence_wav(scratch, "chunk_000.wav", 0.1, CHUNK_SAMPLE_RATE);
                Err(SegmentationError::ToolFailed { code: Some(code) })
            }
            SegmenterFailure::MissingTool => Err(SegmentationError::Spawn {
                program: "ffmpeg".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}

enum Script {
    Succeed,
    FailAt(usize, String),
    PanicAt(usize),
}

/// Recognizer returning canned texts in call order.
pub struct ScriptedProvider {
    texts: Vec<String>,
    script: Script,
    calls: AtomicUsize,
    languages: Mutex<Vec<Option<String>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn with_script(texts: &[&str], script: Script) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            script,
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::with_script(texts, Script::Succeed)
    }

    /// Fails on the 1-based call `index`.
    pub fn failing_at(texts: &[&str], index: usize, message: &str) -> Self {
        Self::with_script(texts, Script::FailAt(index, message.to_string()))
    }

    pub fn panicking_at(texts: &[&str], index: usize) -> Self {
        Self::with_script(texts, Script::PanicAt(index))
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn languages(&self) -> Vec<Option<String>> {
        self.languages.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionProvider for ScriptedProvider {
    async fn transcribe(
        &self,
        _chunk: &Path,
        language: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.languages.lock().unwrap().push(language.map(str::to_string));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            Script::FailAt(index, message) if *index == call => {
                return Err(TranscriptionError::EngineFailed(message.clone()))
            }
            Script::PanicAt(index) if *index == call => panic!("engine crashed on call {}", call),
            _ => {}
        }

        Ok(self.texts.get(call - 1).cloned().unwrap_or_default())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Probe answering the same duration for every file.
pub struct FixedProbe(pub Option<f64>);

#[async_trait]
impl DurationProbe for FixedProbe {
    async fn probe_seconds(&self, _path: &Path) -> Option<f64> {
        self.0
    }
}

/// Application state over an in-memory database rooted in `dir`.
pub async fn test_state(
    dir: &Path,
    segmenter: Arc<dyn AudioSegmenter>,
    provider: Arc<dyn TranscriptionProvider>,
    probe: Arc<dyn DurationProbe>,
) -> AppState {
    let db = DatabaseManager::in_memory().await.unwrap();
    let pipeline = StreamingPipeline::new(segmenter, provider, db.clone(), dir.join("temp_audio_input"), 20);
    AppState {
        db,
        sessions: Arc::new(SessionStore::new(Duration::from_secs(3600))),
        pipeline: Arc::new(pipeline),
        probe,
        audio_storage: dir.join("stored_audio"),
    }
}

/// Router served on an ephemeral local port.
pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub state: AppState,
    pub dir: tempfile::TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn create_user(&self, login: &str, password: &str, is_admin: bool) -> i64 {
        UsersRepository::insert_user(
            self.state.db.pool(),
            &NewUser {
                login: login.to_lowercase(),
                email: None,
                first_name: None,
                last_name: None,
                password_hash: hash_password(password).unwrap(),
                is_admin,
            },
        )
        .await
        .unwrap()
    }

    /// Create a user and return a bearer token for it.
    pub async fn token_for(&self, login: &str, is_admin: bool) -> String {
        let id = self.create_user(login, "s3cret", is_admin).await;
        self.state.sessions.issue(id)
    }

    pub fn scratch_root(&self) -> &Path {
        self.state.pipeline.scratch_root()
    }

    /// Wait for the background run to record its transcript.
    pub async fn wait_for_transcripts(&self, login: &str, expected: i64) -> i64 {
        let mut count = 0;
        for _ in 0..50 {
            count = TranscriptsRepository::count_for_user(self.state.db.pool(), login)
                .await
                .unwrap();
            if count >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        count
    }
}

pub async fn spawn_app(
    segmenter: Arc<dyn AudioSegmenter>,
    provider: Arc<dyn TranscriptionProvider>,
    probe: Arc<dyn DurationProbe>,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), segmenter, provider, probe).await;
    let app = router(state.clone(), 16 * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        state,
        dir,
    }
}
