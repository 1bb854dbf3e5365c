//! Shared application state.
//!
//! Everything expensive is built once at startup and shared by every request:
//! the recognizer (inside [`SttPipeline`]), the chat client and the speech
//! synthesizer. Handlers consult readiness per request instead of the server
//! refusing to start when a dependency is missing.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::core::audio::{AudioError, SpectralGate, SymphoniaDecoder};
use crate::core::llm::{ChatError, ChatModel, GeminiClient};
use crate::core::scratch::ScratchDir;
use crate::core::stt::{SttPipeline, Transcriber, load_transcriber};
use crate::core::tts::{GoogleTranslateTts, SpeechSynthesizer, TtsError};
use crate::core::worker_pool::WorkerPool;

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid noise reduction settings: {0}")]
    NoiseReduction(#[from] AudioError),

    #[error("Failed to create chat client: {0}")]
    Chat(#[from] ChatError),

    #[error("Failed to create speech synthesizer: {0}")]
    Synthesizer(#[from] TtsError),
}

pub struct AppState {
    pub config: ServerConfig,
    pub stt: SttPipeline,
    pub chat: Arc<dyn ChatModel>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Scratch directory for synthesized audio; the pipeline holds its own handle
    pub scratch: ScratchDir,
}

impl AppState {
    /// Build every shared service from `config`.
    ///
    /// A missing or unloadable Whisper model is not fatal: `/stt` then answers
    /// with a model-unavailable error. Invalid settings are.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, StartupError> {
        let whisper_config = config.whisper_config();
        let transcriber: Option<Arc<dyn Transcriber>> =
            match tokio::task::spawn_blocking(move || load_transcriber(whisper_config)).await {
                Ok(transcriber) => transcriber,
                Err(e) => {
                    error!(error = %e, "Whisper model loader panicked");
                    None
                }
            };

        let scratch = ScratchDir::new(config.stt.scratch_dir.clone());
        let pool = WorkerPool::new(config.stt.worker_threads);
        let decoder = Arc::new(SymphoniaDecoder::new(config.ffmpeg_fallback()));
        let reducer = Arc::new(SpectralGate::new(config.noise_reduction_config())?);
        let stt = SttPipeline::new(
            config.pipeline_config(),
            pool,
            scratch.clone(),
            decoder,
            reducer,
            transcriber,
        );

        if !config.has_chat_credentials() {
            warn!("GEMINI_API_KEY is not set; /chat will report the model as unavailable");
        }
        let chat: Arc<dyn ChatModel> = Arc::new(GeminiClient::new(config.gemini_config())?);
        let synthesizer: Arc<dyn SpeechSynthesizer> =
            Arc::new(GoogleTranslateTts::new(config.tts_client_config())?);

        info!(
            stt_model_loaded = stt.is_loaded(),
            chat_ready = chat.is_ready(),
            workers = config.stt.worker_threads,
            scratch_dir = %scratch.root().display(),
            "Application state initialized"
        );

        Ok(Arc::new(Self {
            config,
            stt,
            chat,
            synthesizer,
            scratch,
        }))
    }

    /// Assemble state from prebuilt services.
    pub fn with_services(
        config: ServerConfig,
        stt: SttPipeline,
        chat: Arc<dyn ChatModel>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Arc<Self> {
        let scratch = stt.scratch().clone();
        Arc::new(Self {
            config,
            stt,
            chat,
            synthesizer,
            scratch,
        })
    }
}
