// transcription/provider.rs
//
// Defines the TranscriptionProvider trait used by the streaming pipeline and
// the chunk decoding shared by engine implementations.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::CHUNK_SAMPLE_RATE;

/// Granular error types for transcription operations
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("No transcription model is loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Invalid audio chunk {path}: {reason}")]
    InvalidAudio { path: String, reason: String },

    #[error("Transcription engine failed: {0}")]
    EngineFailed(String),
}

/// Speech-recognition capability: one chunk in, its text out.
///
/// Implementations are called once per chunk, strictly in order, with no
/// context carried between calls. Returned text is the raw engine output;
/// callers decide on trimming.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Transcribe one 16kHz mono PCM chunk.
    ///
    /// `language` is an optional hint (e.g. "fr", "ar", "en"); `None` means
    /// automatic detection.
    async fn transcribe(
        &self,
        chunk: &Path,
        language: Option<&str>,
    ) -> std::result::Result<String, TranscriptionError>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Decode a chunk written by the segmenter into normalized f32 samples.
pub fn read_chunk_samples(chunk: &Path) -> Result<Vec<f32>, TranscriptionError> {
    let invalid = |reason: String| TranscriptionError::InvalidAudio {
        path: chunk.display().to_string(),
        reason,
    };

    let reader = hound::WavReader::open(chunk).map_err(|e| invalid(e.to_string()))?;
    let spec = reader.spec();

    if spec.channels != 1
        || spec.sample_rate != CHUNK_SAMPLE_RATE
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(invalid(format!(
            "expected mono 16-bit PCM at {} Hz, got {} channel(s) {}-bit at {} Hz",
            CHUNK_SAMPLE_RATE, spec.channels, spec.bits_per_sample, spec.sample_rate
        )));
    }

    reader
        .into_samples::<i16>()
        .map(|sample| sample.map(|s| s as f32 / 32768.0))
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| invalid(e.to_string()))
}
