//! Speech-to-text: the recognizer abstraction and the request pipeline.
//!
//! A [`Transcriber`] turns a canonical 16 kHz mono WAV on disk into text.
//! Decoding is always pinned: fixed language, transcription (never
//! translation), temperature 0 without fallback, greedy search and no
//! conditioning on earlier output, so identical audio yields identical text.
//!
//! [`SttPipeline`] sequences decode → denoise → encode → transcribe for one
//! upload on the worker pool and guarantees every scratch file is released.

pub mod pipeline;
pub mod whisper;

pub use pipeline::{
    PipelineState, SttError, SttPipeline, SttPipelineConfig, Stage, StageError, StageFailure,
    UploadedAudio,
};
pub use whisper::{WhisperConfig, WhisperTranscriber, load_transcriber};

use std::path::Path;

use crate::core::audio::AudioError;

/// Default recognition language (Persian).
pub const DEFAULT_LANGUAGE: &str = "fa";

/// Default priming prompt; nudges the model toward conversational Persian.
pub const DEFAULT_INITIAL_PROMPT: &str =
    "سلام، وقتت بخیر. یه پیام صوتی ضبط کردم، می‌تونی دقیقاً متنشو برام بنویسی؟";

/// Per-call decoding options. Everything not listed here is fixed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    pub language: String,
    pub initial_prompt: Option<String>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            initial_prompt: Some(DEFAULT_INITIAL_PROMPT.to_string()),
        }
    }
}

/// Outcome of a successful recognition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptResult {
    /// Non-empty, trimmed text
    Text(String),
    /// The model produced nothing but whitespace
    NoSpeech,
}

impl TranscriptResult {
    /// Classify raw recognizer output.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::NoSpeech
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Transcript text; empty when no speech was detected.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::NoSpeech => "",
        }
    }

    pub fn is_speech(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("Speech recognition model is not loaded")]
    NotLoaded,

    #[error("Failed to read canonical audio: {0}")]
    Audio(#[from] AudioError),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Blocking speech recognizer shared read-only by all requests.
pub trait Transcriber: Send + Sync {
    /// Whether a model is loaded and [`Transcriber::transcribe`] can succeed.
    fn is_loaded(&self) -> bool;

    fn model_name(&self) -> &str;

    /// Recognize the 16 kHz mono WAV at `audio_path`. Returns raw text, possibly empty.
    fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
    ) -> Result<String, TranscribeError>;
}
