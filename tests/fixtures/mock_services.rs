//! Mock services standing in for the recognizer, the chat model and the
//! speech synthesizer, plus stages that fail on demand.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use voice_bridge::core::audio::{
    AudioDecoder, AudioError, NoiseReducer, NoiseReductionConfig, SampleBuffer, SpectralGate,
    SymphoniaDecoder, read_wav_mono,
};
use voice_bridge::core::llm::{ChatError, ChatModel, ChatRequest};
use voice_bridge::core::scratch::ScratchDir;
use voice_bridge::core::stt::{
    SttPipeline, SttPipelineConfig, TranscribeError, TranscribeOptions, Transcriber,
};
use voice_bridge::core::tts::{SpeechSynthesizer, TtsError};
use voice_bridge::core::worker_pool::WorkerPool;

/// Canonical audio quieter than this is treated as silence.
pub const SPEECH_RMS_THRESHOLD: f32 = 1e-3;

/// How an injected stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Error,
    Panic,
}

// =============================================================================
// Recognizer
// =============================================================================

/// Energy-based recognizer.
///
/// Reads the canonical WAV and returns a transcript derived from its content,
/// or an empty string when it is below [`SPEECH_RMS_THRESHOLD`]. Tracks how
/// many calls run at once and which files it was handed.
#[derive(Default)]
pub struct EnergyTranscriber {
    delay: Duration,
    fault: Option<Fault>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen_paths: Mutex<Vec<PathBuf>>,
}

impl EnergyTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(fault: Fault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen_paths.lock().unwrap().clone()
    }

    fn recognize(&self, audio_path: &Path, options: &TranscribeOptions) -> Result<String, TranscribeError> {
        if self.fault == Some(Fault::Error) {
            return Err(TranscribeError::Inference("injected inference failure".to_string()));
        }
        let audio = read_wav_mono(audio_path)?;
        if audio.rms() < SPEECH_RMS_THRESHOLD {
            return Ok(String::new());
        }
        Ok(format!(
            "[{}] {} samples, rms {:.4}",
            options.language,
            audio.len(),
            audio.rms()
        ))
    }
}

impl Transcriber for EnergyTranscriber {
    fn is_loaded(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "energy-mock"
    }

    fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
    ) -> Result<String, TranscribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.seen_paths
            .lock()
            .unwrap()
            .push(audio_path.to_path_buf());

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let result = self.recognize(audio_path, options);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fault == Some(Fault::Panic) {
            panic!("injected inference panic");
        }
        result
    }
}

/// Recognizer whose model failed to load.
pub struct UnloadedTranscriber;

impl Transcriber for UnloadedTranscriber {
    fn is_loaded(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "unloaded"
    }

    fn transcribe(&self, _: &Path, _: &TranscribeOptions) -> Result<String, TranscribeError> {
        Err(TranscribeError::NotLoaded)
    }
}

// =============================================================================
// Faulty stages
// =============================================================================

pub struct FaultyDecoder(pub Fault);

impl AudioDecoder for FaultyDecoder {
    fn decode(&self, _path: &Path) -> Result<SampleBuffer, AudioError> {
        match self.0 {
            Fault::Error => Err(AudioError::Decode("injected decode failure".to_string())),
            Fault::Panic => panic!("injected decode panic"),
        }
    }
}

pub struct FaultyReducer(pub Fault);

impl NoiseReducer for FaultyReducer {
    fn reduce(&self, _input: &SampleBuffer) -> Result<SampleBuffer, AudioError> {
        match self.0 {
            Fault::Error => Err(AudioError::Denoise("injected denoise failure".to_string())),
            Fault::Panic => panic!("injected denoise panic"),
        }
    }
}

// =============================================================================
// Pipeline builders
// =============================================================================

pub fn native_decoder() -> Arc<dyn AudioDecoder> {
    Arc::new(SymphoniaDecoder::new(None))
}

pub fn spectral_gate() -> Arc<dyn NoiseReducer> {
    Arc::new(SpectralGate::new(NoiseReductionConfig::default()).unwrap())
}

/// Pipeline with the real decoder and noise gate around `transcriber`.
pub fn pipeline_with(scratch_root: &Path, transcriber: Arc<dyn Transcriber>) -> SttPipeline {
    pipeline_from_parts(
        scratch_root,
        SttPipelineConfig::default(),
        4,
        native_decoder(),
        spectral_gate(),
        Some(transcriber),
    )
}

pub fn pipeline_from_parts(
    scratch_root: &Path,
    config: SttPipelineConfig,
    workers: usize,
    decoder: Arc<dyn AudioDecoder>,
    reducer: Arc<dyn NoiseReducer>,
    transcriber: Option<Arc<dyn Transcriber>>,
) -> SttPipeline {
    SttPipeline::new(
        config,
        WorkerPool::new(workers),
        ScratchDir::new(scratch_root),
        decoder,
        reducer,
        transcriber,
    )
}

/// Number of entries left in a scratch directory.
pub fn scratch_entries(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// =============================================================================
// Chat model
// =============================================================================

#[derive(Debug, Clone)]
pub enum ChatBehavior {
    Reply(String),
    Empty,
    Unreachable,
}

pub struct MockChat {
    ready: bool,
    behavior: ChatBehavior,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl MockChat {
    pub fn replying(reply: &str) -> Self {
        Self::new(true, ChatBehavior::Reply(reply.to_string()))
    }

    pub fn new(ready: bool, behavior: ChatBehavior) -> Self {
        Self {
            ready,
            behavior,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChat {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }

    async fn generate(&self, request: ChatRequest) -> Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        if !self.ready {
            return Err(ChatError::NotConfigured);
        }
        match &self.behavior {
            ChatBehavior::Reply(reply) => Ok(reply.clone()),
            ChatBehavior::Empty => Err(ChatError::EmptyResponse),
            ChatBehavior::Unreachable => Err(ChatError::Transport("connection refused".to_string())),
        }
    }
}

// =============================================================================
// Speech synthesizer
// =============================================================================

/// Returns fixed MP3 bytes, or fails when constructed with [`MockSynthesizer::failing`].
pub struct MockSynthesizer {
    audio: Bytes,
    fail: bool,
    calls: AtomicUsize,
    last: Mutex<Option<(String, String)>>,
}

impl MockSynthesizer {
    pub fn new(audio: &'static [u8]) -> Self {
        Self {
            audio: Bytes::from_static(audio),
            fail: false,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(b"")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Text and language of the last call.
    pub fn last_call(&self) -> Option<(String, String)> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        "mock-tts"
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((text.to_string(), language.to_string()));
        if self.fail {
            return Err(TtsError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        if text.trim().is_empty() {
            return Err(TtsError::InvalidInput);
        }
        Ok(self.audio.clone())
    }
}
