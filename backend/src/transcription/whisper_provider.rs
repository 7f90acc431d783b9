// transcription/whisper_provider.rs
//
// Whisper transcription provider (local ggml model through whisper.cpp).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::provider::{read_chunk_samples, TranscriptionError, TranscriptionProvider};

pub struct WhisperProvider {
    context: Arc<WhisperContext>,
    model_name: String,
}

impl WhisperProvider {
    /// Detect available GPU acceleration capabilities
    fn detect_gpu_acceleration() -> bool {
        if cfg!(feature = "metal") {
            log::info!("Metal feature enabled - attempting GPU acceleration");
            return true;
        }
        if cfg!(feature = "cuda") {
            log::info!("CUDA feature enabled - attempting GPU acceleration");
            return true;
        }
        if cfg!(feature = "vulkan") {
            log::info!("Vulkan feature enabled - attempting GPU acceleration");
            return true;
        }
        if cfg!(feature = "hipblas") {
            log::info!("HIPBLAS feature enabled - attempting GPU acceleration");
            return true;
        }

        log::info!("No GPU acceleration features detected - using CPU processing");
        false
    }

    /// Load the model once. Called from the startup phase, never lazily.
    pub fn load(model_path: &Path) -> Result<Self, TranscriptionError> {
        if !model_path.exists() {
            return Err(TranscriptionError::ModelNotLoaded(format!(
                "model file {} does not exist",
                model_path.display()
            )));
        }

        // Reduce whisper.cpp verbosity
        std::env::set_var("GGML_METAL_LOG_LEVEL", "1");
        std::env::set_var("WHISPER_LOG_LEVEL", "1");

        let context_param = WhisperContextParameters {
            use_gpu: Self::detect_gpu_acceleration(),
            ..Default::default()
        };

        log::info!("Loading whisper model: {}", model_path.display());
        let context = WhisperContext::new_with_params(&model_path.to_string_lossy(), context_param)
            .map_err(|e| {
                TranscriptionError::ModelNotLoaded(format!(
                    "failed to load {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        let model_name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "whisper".to_string());
        log::info!("Successfully loaded model: {}", model_name);

        Ok(Self {
            context: Arc::new(context),
            model_name,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn run_full(
        context: &WhisperContext,
        samples: &[f32],
        language: Option<&str>,
    ) -> Result<String, whisper_rs::WhisperError> {
        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: 5,
            patience: 1.0,
        });

        // None lets whisper detect the language of every chunk on its own
        params.set_language(language);
        params.set_translate(false);

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);
        params.set_temperature(0.0);

        let mut state = context.create_state()?;
        state.full(params, samples)?;

        let num_segments = state.full_n_segments()?;
        let mut text = String::new();
        for i in 0..num_segments {
            // Segment text is kept as produced, leading spaces included
            text.push_str(&state.full_get_segment_text_lossy(i)?);
        }
        Ok(text)
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperProvider {
    async fn transcribe(
        &self,
        chunk: &Path,
        language: Option<&str>,
    ) -> std::result::Result<String, TranscriptionError> {
        let samples = read_chunk_samples(chunk)?;
        let duration_seconds = samples.len() as f64 / crate::audio::CHUNK_SAMPLE_RATE as f64;
        log::debug!(
            "Starting whisper transcription of {} ({:.1}s, language: {})",
            chunk.display(),
            duration_seconds,
            language.unwrap_or("auto")
        );

        let context = Arc::clone(&self.context);
        let language = language.map(str::to_owned);

        // whisper.cpp inference is CPU/GPU bound; keep it off the async workers
        tokio::task::spawn_blocking(move || Self::run_full(&context, &samples, language.as_deref()))
            .await
            .map_err(|e| TranscriptionError::EngineFailed(format!("inference task failed: {}", e)))?
            .map_err(|e| TranscriptionError::EngineFailed(e.to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "Whisper"
    }
}
