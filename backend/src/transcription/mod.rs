// transcription/mod.rs
//
// Transcription module: provider abstraction over the speech-recognition engine.

pub mod provider;
#[cfg(feature = "whisper")]
pub mod whisper_provider;

pub use provider::{read_chunk_samples, TranscriptionError, TranscriptionProvider};
#[cfg(feature = "whisper")]
pub use whisper_provider::WhisperProvider;
