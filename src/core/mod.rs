pub mod audio;
pub mod llm;
pub mod scratch;
pub mod stt;
pub mod tts;
pub mod worker_pool;

// Re-export commonly used types for convenience
pub use audio::{AudioDecoder, AudioError, NoiseReducer, SampleBuffer};
pub use llm::{ChatError, ChatModel, ChatRequest, GeminiClient};
pub use scratch::{ArtifactFormat, ScratchDir, ScratchFile};
pub use stt::{SttError, SttPipeline, Transcriber, TranscriptResult, UploadedAudio};
pub use tts::{GoogleTranslateTts, SpeechSynthesizer, TtsError};
pub use worker_pool::{WorkerError, WorkerPool};
