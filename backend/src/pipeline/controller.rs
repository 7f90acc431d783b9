use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use super::events::ProgressEvent;
use crate::audio::{AudioSegmenter, Chunk, ScratchDir, SegmentationError};
use crate::database::models::NewTranscript;
use crate::database::repositories::TranscriptsRepository;
use crate::database::DatabaseManager;
use crate::transcription::TranscriptionProvider;

pub const SEGMENTATION_FAILED_MESSAGE: &str = "Impossible de découper le fichier audio.";
pub const NO_SEGMENT_MESSAGE: &str = "Aucun segment audio détecté.";
const INTERNAL_ERROR_MESSAGE: &str = "Erreur interne pendant la transcription.";

/// Events buffered between a run and the response body. Together with the
/// wait in [`EventSink::emit`], one slot means a chunk is taken by the body
/// before the next one is recognized.
const EVENT_BUFFER: usize = 1;

/// One uploaded file to transcribe for one user.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub user_login: String,
    pub file_path: PathBuf,
    pub duration_seconds: Option<f64>,
    /// Language hint; `None` lets the engine detect it.
    pub language: Option<String>,
}

/// States of one run. `Emitting` holds the 1-based index of the next chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Segmenting,
    Emitting(usize),
    Completing,
    Errored,
    Done,
}

/// How a run ended, for the caller of [`StreamingPipeline::run`].
#[derive(Debug)]
pub enum RunOutcome {
    /// `complete` was sent and the transcript row exists.
    Recorded { transcript_id: i64, chunks: usize },
    /// `complete` was sent but the transcript could not be stored.
    StorageFailed { error: sqlx::Error },
    /// A terminal `error` event was sent.
    Failed { message: String },
    /// The caller stopped listening before the terminal event.
    Abandoned,
}

/// Sender side of a run's event stream. Remembers whether a terminal event
/// went out so a crashed run can still be closed properly.
#[derive(Clone)]
struct EventSink {
    tx: mpsc::Sender<ProgressEvent>,
    terminal_sent: Arc<AtomicBool>,
}

impl EventSink {
    fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            terminal_sent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver one event; `false` when the receiver is gone.
    ///
    /// A non-terminal event counts as delivered once the receiver has taken
    /// it off the channel, not when it is queued.
    async fn emit(&self, event: ProgressEvent) -> bool {
        let terminal = event.is_terminal();
        if self.tx.send(event).await.is_err() {
            return false;
        }
        if terminal {
            self.terminal_sent.store(true, Ordering::SeqCst);
            return true;
        }
        // Slot free again means the event was received
        self.tx.reserve().await.is_ok()
    }

    fn terminal_sent(&self) -> bool {
        self.terminal_sent.load(Ordering::SeqCst)
    }
}

enum Failure {
    Reported(String),
    Disconnected,
}

/// Progress of the state machine, owned by a single run.
struct RunProgress {
    state: RunState,
    chunks: Vec<Chunk>,
    texts: Vec<String>,
    failure: Option<Failure>,
}

impl RunProgress {
    fn new() -> Self {
        Self {
            state: RunState::Segmenting,
            chunks: Vec::new(),
            texts: Vec::new(),
            failure: None,
        }
    }

    /// Text persisted for the run: trimmed chunk texts joined by single spaces.
    fn full_text(&self) -> String {
        self.texts.join(" ").trim().to_string()
    }
}

/// Drives segmentation, ordered recognition, event emission, scratch cleanup
/// and transcript recording for one upload at a time per run.
pub struct StreamingPipeline {
    segmenter: Arc<dyn AudioSegmenter>,
    provider: Arc<dyn TranscriptionProvider>,
    db: DatabaseManager,
    scratch_root: PathBuf,
    chunk_seconds: u32,
}

impl StreamingPipeline {
    pub fn new(
        segmenter: Arc<dyn AudioSegmenter>,
        provider: Arc<dyn TranscriptionProvider>,
        db: DatabaseManager,
        scratch_root: PathBuf,
        chunk_seconds: u32,
    ) -> Self {
        Self {
            segmenter,
            provider,
            db,
            scratch_root,
            chunk_seconds,
        }
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Run the job on its own task and return the event stream.
    ///
    /// The task owns the run to the end, so cleanup does not depend on the
    /// caller still reading.
    pub fn start(self: &Arc<Self>, job: TranscriptionJob) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let sink = EventSink::new(tx);
        let pipeline = Arc::clone(self);

        tokio::spawn(async move {
            let guard = sink.clone();
            let run = AssertUnwindSafe(pipeline.run_with_sink(job, sink)).catch_unwind();
            if run.await.is_err() {
                error!("Transcription run panicked");
                if !guard.terminal_sent() {
                    guard.emit(ProgressEvent::error(INTERNAL_ERROR_MESSAGE)).await;
                }
            }
        });

        rx
    }

    /// Execute one run to completion, sending its events on `events`.
    pub async fn run(&self, job: TranscriptionJob, events: mpsc::Sender<ProgressEvent>) -> RunOutcome {
        self.run_with_sink(job, EventSink::new(events)).await
    }

    async fn run_with_sink(&self, job: TranscriptionJob, sink: EventSink) -> RunOutcome {
        info!(
            "Starting transcription run for '{}' on {} (language: {})",
            job.user_login,
            job.file_path.display(),
            job.language.as_deref().unwrap_or("auto")
        );

        let scratch = match ScratchDir::acquire(&self.scratch_root) {
            Ok(scratch) => scratch,
            Err(e) => {
                error!("Failed to create scratch directory under {}: {}", self.scratch_root.display(), e);
                let message = e.to_string();
                if !sink.emit(ProgressEvent::error(message.clone())).await {
                    return RunOutcome::Abandoned;
                }
                return RunOutcome::Failed { message };
            }
        };

        let mut progress = RunProgress::new();
        self.drive(&job, scratch.path(), &sink, &mut progress).await;

        // Released on every exit path, before anything is persisted
        scratch.release();

        match progress.state {
            RunState::Completing => self.record(&job, &mut progress).await,
            _ => match progress.failure {
                Some(Failure::Reported(message)) => {
                    info!("Transcription run for '{}' failed: {}", job.user_login, message);
                    RunOutcome::Failed { message }
                }
                Some(Failure::Disconnected) | None => {
                    warn!(
                        "Caller disconnected during transcription of {}; nothing recorded",
                        job.file_path.display()
                    );
                    RunOutcome::Abandoned
                }
            },
        }
    }

    /// Advance the state machine until it reaches `Completing` or `Errored`.
    async fn drive(
        &self,
        job: &TranscriptionJob,
        scratch: &Path,
        sink: &EventSink,
        progress: &mut RunProgress,
    ) {
        loop {
            progress.state = match progress.state {
                RunState::Segmenting => self.segment(job, scratch, sink, progress).await,
                RunState::Emitting(index) => self.emit_chunk(job, index, sink, progress).await,
                RunState::Completing | RunState::Errored | RunState::Done => return,
            };
        }
    }

    async fn segment(
        &self,
        job: &TranscriptionJob,
        scratch: &Path,
        sink: &EventSink,
        progress: &mut RunProgress,
    ) -> RunState {
        match self
            .segmenter
            .segment(&job.file_path, self.chunk_seconds, scratch)
            .await
        {
            Ok(chunks) if chunks.is_empty() => {
                warn!("No audio segment produced for {}", job.file_path.display());
                Self::fail(sink, progress, NO_SEGMENT_MESSAGE.to_string()).await
            }
            Ok(chunks) => {
                info!("Transcribing {} chunk(s) of {}", chunks.len(), job.file_path.display());
                progress.chunks = chunks;
                RunState::Emitting(1)
            }
            Err(SegmentationError::ToolFailed { code }) => {
                error!("Segmentation of {} failed (exit code {:?})", job.file_path.display(), code);
                Self::fail(sink, progress, SEGMENTATION_FAILED_MESSAGE.to_string()).await
            }
            Err(e) => {
                error!("Segmentation of {} failed: {}", job.file_path.display(), e);
                Self::fail(sink, progress, e.to_string()).await
            }
        }
    }

    async fn emit_chunk(
        &self,
        job: &TranscriptionJob,
        index: usize,
        sink: &EventSink,
        progress: &mut RunProgress,
    ) -> RunState {
        if index > progress.chunks.len() {
            if !sink.emit(ProgressEvent::Complete).await {
                progress.failure = Some(Failure::Disconnected);
                return RunState::Errored;
            }
            return RunState::Completing;
        }

        let chunk_path = progress.chunks[index - 1].path.clone();
        let text = match self
            .provider
            .transcribe(&chunk_path, job.language.as_deref())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!(
                    "{} failed on chunk {}/{}: {}",
                    self.provider.provider_name(),
                    index,
                    progress.chunks.len(),
                    e
                );
                return Self::fail(sink, progress, e.to_string()).await;
            }
        };

        debug!("Chunk {}/{} transcribed ({} chars)", index, progress.chunks.len(), text.len());
        progress.texts.push(text.trim().to_string());

        if !sink.emit(ProgressEvent::Chunk { index, text }).await {
            progress.failure = Some(Failure::Disconnected);
            return RunState::Errored;
        }
        RunState::Emitting(index + 1)
    }

    async fn fail(sink: &EventSink, progress: &mut RunProgress, message: String) -> RunState {
        progress.failure = if sink.emit(ProgressEvent::error(message.clone())).await {
            Some(Failure::Reported(message))
        } else {
            Some(Failure::Disconnected)
        };
        RunState::Errored
    }

    async fn record(&self, job: &TranscriptionJob, progress: &mut RunProgress) -> RunOutcome {
        let file_name = job
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let transcript = NewTranscript {
            user_login: job.user_login.clone(),
            file_name,
            file_path: job.file_path.display().to_string(),
            duration_seconds: job.duration_seconds,
            transcribed_at: Utc::now(),
            full_text: progress.full_text(),
        };

        match TranscriptsRepository::insert_transcript(self.db.pool(), &transcript).await {
            Ok(transcript_id) => {
                progress.state = RunState::Done;
                info!(
                    "Recorded transcript {} for '{}' ({} chunk(s))",
                    transcript_id,
                    job.user_login,
                    progress.chunks.len()
                );
                RunOutcome::Recorded {
                    transcript_id,
                    chunks: progress.chunks.len(),
                }
            }
            Err(error) => {
                // `complete` is already out; this can only be reported here
                error!(
                    "Failed to record transcript of {} for '{}' after a successful run: {}",
                    job.file_path.display(),
                    job.user_login,
                    error
                );
                RunOutcome::StorageFailed { error }
            }
        }
    }
}
