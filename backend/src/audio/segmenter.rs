use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tempfile::TempDir;
use thiserror::Error;

use super::ffmpeg::tool_command;

/// Default length of one recognition chunk, in seconds.
pub const DEFAULT_CHUNK_SECONDS: u32 = 20;

/// Sample rate every chunk is re-encoded to (mono, 16-bit PCM).
pub const CHUNK_SAMPLE_RATE: u32 = 16_000;

const CHUNK_PREFIX: &str = "chunk_";
const CHUNK_EXTENSION: &str = "wav";

#[derive(Debug, Error)]
pub enum SegmentationError {
    /// The segmentation tool ran and reported failure.
    #[error("audio segmentation tool {}", exit_description(.code))]
    ToolFailed { code: Option<i32> },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect audio chunks: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// One re-encoded slice of the source audio. Indices start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub path: PathBuf,
}

/// Uniquely named directory holding the chunks of exactly one run.
///
/// The owner must call [`ScratchDir::release`] on every exit path. Dropping
/// without releasing still removes the directory (panic or task abort).
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn acquire(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix("chunks_")
            .tempdir_in(root)?;
        debug!("Acquired scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Recursively remove the directory. Removal errors are logged and
    /// swallowed; returns whether the removal succeeded.
    pub fn release(self) -> bool {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!("Released scratch directory {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to remove scratch directory {}: {}", path.display(), e);
                false
            }
        }
    }
}

/// Splits one source file into ordered, fixed-duration chunks.
#[async_trait]
pub trait AudioSegmenter: Send + Sync {
    /// Write the chunks of `source` into `scratch` and return them in order.
    ///
    /// Files already written when an error is returned are scratch; the
    /// caller owns their removal.
    async fn segment(
        &self,
        source: &Path,
        chunk_seconds: u32,
        scratch: &Path,
    ) -> Result<Vec<Chunk>, SegmentationError>;
}

/// Segmenter backed by the `ffmpeg` segment muxer.
pub struct FfmpegSegmenter {
    ffmpeg: PathBuf,
}

impl FfmpegSegmenter {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    fn build_args(source: &Path, chunk_seconds: u32, scratch: &Path) -> Vec<String> {
        let pattern = scratch.join(format!("{}%03d.{}", CHUNK_PREFIX, CHUNK_EXTENSION));
        vec![
            "-i".to_string(),
            source.display().to_string(),
            "-f".to_string(),
            "segment".to_string(),
            "-segment_time".to_string(),
            chunk_seconds.to_string(),
            "-map".to_string(),
            "0:a:0".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            CHUNK_SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            pattern.display().to_string(),
            "-loglevel".to_string(),
            "quiet".to_string(),
        ]
    }
}

#[async_trait]
impl AudioSegmenter for FfmpegSegmenter {
    async fn segment(
        &self,
        source: &Path,
        chunk_seconds: u32,
        scratch: &Path,
    ) -> Result<Vec<Chunk>, SegmentationError> {
        let args = Self::build_args(source, chunk_seconds, scratch);
        debug!("FFmpeg segment command: {} {}", self.ffmpeg.display(), args.join(" "));

        let output = tool_command(&self.ffmpeg)
            .args(&args)
            .output()
            .await
            .map_err(|source| SegmentationError::Spawn {
                program: self.ffmpeg.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            error!(
                "FFmpeg segmentation of {} failed with status: {}",
                source.display(),
                output.status
            );
            return Err(SegmentationError::ToolFailed {
                code: output.status.code(),
            });
        }

        let chunks = collect_chunks(scratch)?;
        info!(
            "Segmented {} into {} chunk(s) of {}s",
            source.display(),
            chunks.len(),
            chunk_seconds
        );
        Ok(chunks)
    }
}

/// List the `chunk_*.wav` files of a scratch directory in segment order.
///
/// Ordering follows the number in the file stem, so `chunk_1000` comes after
/// `chunk_999`. Names whose suffix is not a number are skipped.
pub fn collect_chunks(dir: &Path) -> std::io::Result<Vec<Chunk>> {
    let mut numbered: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(CHUNK_EXTENSION))
        .filter_map(|path| {
            let number = path
                .file_stem()?
                .to_str()?
                .strip_prefix(CHUNK_PREFIX)?
                .parse::<u32>()
                .ok()?;
            Some((number, path))
        })
        .collect();

    numbered.sort_by_key(|(number, _)| *number);

    Ok(numbered
        .into_iter()
        .enumerate()
        .map(|(i, (_, path))| Chunk { index: i + 1, path })
        .collect())
}
