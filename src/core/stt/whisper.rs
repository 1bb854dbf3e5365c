//! Local Whisper recognizer backed by whisper.cpp.
//!
//! The real backend needs the `whisper` cargo feature (cmake and a C++
//! toolchain). Without it [`WhisperTranscriber`] still builds and reports the
//! model as not loaded, so the rest of the gateway keeps serving chat and TTS.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::{TranscribeError, TranscribeOptions, Transcriber};

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

#[derive(Debug, Clone, PartialEq)]
pub struct WhisperConfig {
    /// GGML model file
    pub model_path: PathBuf,
    /// Inference threads; `None` lets whisper.cpp decide
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            threads: None,
        }
    }
}

#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: WhisperContext,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

/// Stand-in used when the crate is built without the `whisper` feature.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

fn model_name_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Result<Self, TranscribeError> {
        LOGGING_HOOKS_INSTALLED.call_once(install_logging_hooks);

        if !config.model_path.exists() {
            return Err(TranscribeError::Inference(format!(
                "model file not found: {}",
                config.model_path.display()
            )));
        }
        let path = config.model_path.to_str().ok_or_else(|| {
            TranscribeError::Inference("model path is not valid UTF-8".to_string())
        })?;

        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| TranscribeError::Inference(format!("failed to load model: {e}")))?;

        Ok(Self {
            model_name: model_name_of(&config.model_path),
            context,
            config,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Result<Self, TranscribeError> {
        Ok(Self {
            model_name: model_name_of(&config.model_path),
            config,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn is_loaded(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
    ) -> Result<String, TranscribeError> {
        let audio = crate::core::audio::read_wav_mono(audio_path)?;

        let mut state = self
            .context
            .create_state()
            .map_err(|e| TranscribeError::Inference(format!("failed to create state: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&options.language));
        params.set_translate(false);
        params.set_temperature(0.0);
        params.set_temperature_inc(0.0);
        params.set_no_context(true);
        if let Some(prompt) = options.initial_prompt.as_deref() {
            params.set_initial_prompt(prompt);
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, audio.samples())
            .map_err(|e| TranscribeError::Inference(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }
        Ok(text)
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn is_loaded(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn transcribe(
        &self,
        _audio_path: &Path,
        _options: &TranscribeOptions,
    ) -> Result<String, TranscribeError> {
        Err(TranscribeError::NotLoaded)
    }
}

/// Load the process-wide recognizer.
///
/// Load failures are logged and yield `None`; the gateway then answers `/stt`
/// with a model-unavailable error instead of refusing to start.
pub fn load_transcriber(config: WhisperConfig) -> Option<Arc<dyn Transcriber>> {
    let path = config.model_path.clone();
    match WhisperTranscriber::new(config) {
        Ok(transcriber) if transcriber.is_loaded() => {
            info!(
                model = transcriber.model_name(),
                path = %path.display(),
                "Whisper model loaded"
            );
            Some(Arc::new(transcriber))
        }
        Ok(_) => {
            warn!("Built without the `whisper` feature; speech-to-text is disabled");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load Whisper model");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_from_path() {
        assert_eq!(model_name_of(Path::new("/models/ggml-base.bin")), "ggml-base");
        assert_eq!(model_name_of(Path::new("/")), "unknown");
    }

    #[test]
    fn test_missing_model_is_not_loaded() {
        let transcriber = load_transcriber(WhisperConfig {
            model_path: PathBuf::from("/nonexistent/ggml-base.bin"),
            threads: None,
        });
        assert!(transcriber.is_none());
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_stub_refuses_to_transcribe() {
        let stub = WhisperTranscriber::new(WhisperConfig::default()).unwrap();
        assert!(!stub.is_loaded());
        assert!(matches!(
            stub.transcribe(Path::new("x.wav"), &TranscribeOptions::default()),
            Err(TranscribeError::NotLoaded)
        ));
    }

    #[test]
    fn test_transcriber_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WhisperTranscriber>();
    }
}
