// src/pipeline/mod.rs
//
// Streaming transcription pipeline: segmentation, ordered recognition,
// progressive event delivery and transcript recording.

pub mod controller;
pub mod events;

pub use controller::{RunOutcome, RunState, StreamingPipeline, TranscriptionJob};
pub use events::ProgressEvent;
