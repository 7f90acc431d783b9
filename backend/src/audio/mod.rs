// src/audio/mod.rs
pub mod ffmpeg;
pub mod probe;
pub mod segmenter;

pub use ffmpeg::resolve_tool;
pub use probe::{DurationProbe, FfprobeDurationProbe};
pub use segmenter::{
    collect_chunks, AudioSegmenter, Chunk, FfmpegSegmenter, ScratchDir, SegmentationError,
    CHUNK_SAMPLE_RATE, DEFAULT_CHUNK_SECONDS,
};
