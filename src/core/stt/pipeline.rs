//! Per-request speech-to-text pipeline.
//!
//! ```text
//! Received → InputPersisted → Decoded → Denoised → CanonicalPersisted → Transcribed
//!     └──────────────┴────────────┴──────────┴───────────────┴──→ Failed(stage)
//!                                   (always) → Cleanup
//! ```
//!
//! Every blocking stage runs on the shared [`WorkerPool`]; the request task
//! only awaits. Scratch files are held as `Arc<ScratchFile>` both by the
//! request and by the worker using them. Cleanup unlinks every file the
//! request acquired before it reports, even one an abandoned worker still
//! has open; that worker keeps its descriptor and its guard's own release
//! later finds nothing to delete.
//!
//! Inference additionally passes an inference gate. Its permit travels into
//! the worker closure together with the canonical file, so the configured
//! bound on concurrent model calls holds even for abandoned requests.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{TranscribeError, TranscribeOptions, Transcriber, TranscriptResult};
use crate::core::audio::{AudioDecoder, AudioError, NoiseReducer, overwrite_wav_mono};
use crate::core::scratch::{self, ArtifactFormat, ScratchDir, ScratchError, ScratchFile};
use crate::core::worker_pool::{WorkerError, WorkerPool};

const INPUT_PREFIX: &str = "audio_in";
const CANONICAL_PREFIX: &str = "audio_out";
const DEFAULT_INPUT_EXTENSION: &str = "webm";

// =============================================================================
// Upload
// =============================================================================

/// Raw upload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedAudio {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            file_name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Container extension used for the input scratch file.
    ///
    /// The filename wins over the MIME type; browser recorders default to WebM.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty());
        if let Some(ext) = from_name {
            return ext;
        }

        self.content_type
            .as_deref()
            .and_then(extension_for_mime)
            .unwrap_or(DEFAULT_INPUT_EXTENSION)
            .to_string()
    }
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match essence.as_str() {
        "audio/webm" | "video/webm" => "webm",
        "audio/ogg" | "audio/opus" | "application/ogg" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => return None,
    };
    Some(ext)
}

// =============================================================================
// States and errors
// =============================================================================

/// Blocking unit of work within the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Persist,
    Decode,
    Denoise,
    Encode,
    Transcribe,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Persist => "persist",
            Stage::Decode => "decode",
            Stage::Denoise => "denoise",
            Stage::Encode => "encode",
            Stage::Transcribe => "transcribe",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    InputPersisted,
    Decoded,
    Denoised,
    CanonicalPersisted,
    Transcribed,
    Failed(Stage),
    Cleanup,
}

#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    #[error(transparent)]
    Scratch(#[from] ScratchError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Transcribe(#[from] TranscribeError),

    #[error("stage panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Worker(WorkerError),
}

impl From<WorkerError> for StageFailure {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Panicked(msg) => StageFailure::Panicked(msg),
            other => StageFailure::Worker(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {cause}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub cause: StageFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("speech recognition model is not loaded")]
    ModelUnavailable,

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Debug, Clone)]
pub struct SttPipelineConfig {
    pub options: TranscribeOptions,
    pub request_timeout: Duration,
    /// Model calls allowed at once across all requests
    pub max_concurrent_inference: usize,
}

impl Default for SttPipelineConfig {
    fn default() -> Self {
        Self {
            options: TranscribeOptions::default(),
            request_timeout: Duration::from_secs(120),
            max_concurrent_inference: 1,
        }
    }
}

/// Shared, cheaply cloneable STT orchestrator.
#[derive(Clone)]
pub struct SttPipeline {
    decoder: Arc<dyn AudioDecoder>,
    reducer: Arc<dyn NoiseReducer>,
    transcriber: Option<Arc<dyn Transcriber>>,
    pool: WorkerPool,
    scratch: ScratchDir,
    inference_gate: Arc<Semaphore>,
    options: Arc<TranscribeOptions>,
    request_timeout: Duration,
}

impl fmt::Debug for SttPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SttPipeline")
            .field("model_loaded", &self.is_loaded())
            .field("workers", &self.pool.size())
            .field("scratch", &self.scratch.root())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl SttPipeline {
    pub fn new(
        config: SttPipelineConfig,
        pool: WorkerPool,
        scratch: ScratchDir,
        decoder: Arc<dyn AudioDecoder>,
        reducer: Arc<dyn NoiseReducer>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        Self {
            decoder,
            reducer,
            transcriber,
            pool,
            scratch,
            inference_gate: Arc::new(Semaphore::new(config.max_concurrent_inference.max(1))),
            options: Arc::new(config.options),
            request_timeout: config.request_timeout,
        }
    }

    /// Whether a recognizer is loaded and requests can be served.
    pub fn is_loaded(&self) -> bool {
        self.transcriber.as_ref().is_some_and(|t| t.is_loaded())
    }

    pub fn model_name(&self) -> Option<&str> {
        self.transcriber.as_deref().map(|t| t.model_name())
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Run the whole pipeline for one upload under the request timeout.
    ///
    /// Fails fast with [`SttError::ModelUnavailable`] before touching disk.
    pub async fn process(&self, upload: UploadedAudio) -> Result<TranscriptResult, SttError> {
        let transcriber = match &self.transcriber {
            Some(t) if t.is_loaded() => Arc::clone(t),
            _ => return Err(SttError::ModelUnavailable),
        };

        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.request_timeout,
            self.run(request_id, upload, transcriber),
        )
        .await;

        match outcome {
            Ok(result) => {
                if let Ok(transcript) = &result {
                    info!(
                        request_id = %request_id,
                        speech = transcript.is_speech(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "STT request completed"
                    );
                }
                result
            }
            Err(_) => {
                warn!(
                    request_id = %request_id,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "STT request timed out"
                );
                Err(SttError::TimedOut(self.request_timeout))
            }
        }
    }

    async fn run(
        &self,
        request_id: Uuid,
        upload: UploadedAudio,
        transcriber: Arc<dyn Transcriber>,
    ) -> Result<TranscriptResult, SttError> {
        let mut run = RequestRun::new(request_id);

        // Persist upload
        let input = self
            .acquire(&mut run, INPUT_PREFIX, &upload.extension(), ArtifactFormat::InputContainer)
            .await?;
        if let Err(e) = tokio::fs::write(input.path(), &upload.bytes).await {
            return Err(run.fail(Stage::Persist, e.into()));
        }
        drop(upload);
        run.advance(PipelineState::InputPersisted);

        // Decode and resample
        let decoder = Arc::clone(&self.decoder);
        let file = Arc::clone(&input);
        let decoded = self
            .offload(&mut run, Stage::Decode, move || {
                Ok(decoder.decode(file.path())?)
            })
            .await?;
        run.advance(PipelineState::Decoded);
        debug!(
            request_id = %request_id,
            samples = decoded.len(),
            duration_ms = decoded.duration().as_millis() as u64,
            "Decoded upload"
        );

        // Noise reduction
        let reducer = Arc::clone(&self.reducer);
        let denoised = self
            .offload(&mut run, Stage::Denoise, move || {
                Ok(reducer.reduce(&decoded)?)
            })
            .await?;
        run.advance(PipelineState::Denoised);

        // Canonical WAV
        let canonical = self
            .acquire(&mut run, CANONICAL_PREFIX, "wav", ArtifactFormat::CanonicalWav)
            .await?;
        let file = Arc::clone(&canonical);
        self.offload(&mut run, Stage::Encode, move || {
            Ok(overwrite_wav_mono(file.path(), &denoised)?)
        })
        .await?;
        run.advance(PipelineState::CanonicalPersisted);

        // Inference behind the gate
        let permit = match Arc::clone(&self.inference_gate).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return Err(run.fail(
                    Stage::Transcribe,
                    StageFailure::Worker(WorkerError::Closed),
                ));
            }
        };
        let options = Arc::clone(&self.options);
        let file = Arc::clone(&canonical);
        let raw = self
            .offload(&mut run, Stage::Transcribe, move || {
                let _permit = permit;
                Ok(transcriber.transcribe(file.path(), &options)?)
            })
            .await?;
        run.advance(PipelineState::Transcribed);

        let result = TranscriptResult::from_raw(&raw);
        if !result.is_speech() {
            info!(request_id = %request_id, "No speech detected");
        }
        Ok(result)
    }

    async fn acquire(
        &self,
        run: &mut RequestRun,
        prefix: &str,
        extension: &str,
        format: ArtifactFormat,
    ) -> Result<Arc<ScratchFile>, SttError> {
        let stage = match format {
            ArtifactFormat::CanonicalWav => Stage::Encode,
            _ => Stage::Persist,
        };
        match self.scratch.acquire(prefix, extension, format, run.id).await {
            Ok(file) => {
                let file = Arc::new(file);
                run.hold(Arc::clone(&file));
                Ok(file)
            }
            Err(e) => Err(run.fail(stage, e.into())),
        }
    }

    async fn offload<T, F>(
        &self,
        run: &mut RequestRun,
        stage: Stage,
        task: F,
    ) -> Result<T, SttError>
    where
        F: FnOnce() -> Result<T, StageFailure> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let outcome = self.pool.run(task).await.map_err(StageFailure::from);

        match outcome.and_then(|inner| inner) {
            Ok(value) => {
                debug!(
                    request_id = %run.id,
                    stage = %stage,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Stage finished"
                );
                Ok(value)
            }
            Err(cause) => Err(run.fail(stage, cause)),
        }
    }
}

// =============================================================================
// Request bookkeeping
// =============================================================================

/// Tracks one request's state and the scratch files it owns.
///
/// Dropping it is the cleanup step: it runs on success, on failure and when
/// the request future is cancelled by the timeout.
struct RequestRun {
    id: Uuid,
    state: PipelineState,
    files: Vec<Arc<ScratchFile>>,
}

impl RequestRun {
    fn new(id: Uuid) -> Self {
        debug!(request_id = %id, state = ?PipelineState::Received, "STT request received");
        Self {
            id,
            state: PipelineState::Received,
            files: Vec::new(),
        }
    }

    fn hold(&mut self, file: Arc<ScratchFile>) {
        self.files.push(file);
    }

    fn advance(&mut self, next: PipelineState) {
        debug!(request_id = %self.id, from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
    }

    fn fail(&mut self, stage: Stage, cause: StageFailure) -> SttError {
        error!(
            request_id = %self.id,
            stage = %stage,
            error = %cause,
            "STT stage failed"
        );
        self.state = PipelineState::Failed(stage);
        SttError::Stage(StageError { stage, cause })
    }
}

impl Drop for RequestRun {
    fn drop(&mut self) {
        let last = self.state;
        self.state = PipelineState::Cleanup;
        debug!(
            request_id = %self.id,
            last_state = ?last,
            files = self.files.len(),
            "Releasing request scratch files"
        );
        for file in self.files.drain(..) {
            if let Err(e) = scratch::release(file.path()) {
                warn!(
                    request_id = %self.id,
                    path = %file.path().display(),
                    error = %e,
                    "Failed to release scratch file"
                );
            }
        }
    }
}
