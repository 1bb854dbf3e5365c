//! Configuration module for the voice bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::audio::{FfmpegFallback, NoiseReductionConfig};
use crate::core::llm::{DEFAULT_CHAT_MODEL, DEFAULT_SYSTEM_INSTRUCTION, GeminiConfig};
use crate::core::llm::gemini::DEFAULT_GEMINI_BASE_URL;
use crate::core::stt::{
    DEFAULT_INITIAL_PROMPT, DEFAULT_LANGUAGE, SttPipelineConfig, TranscribeOptions, WhisperConfig,
};
use crate::core::tts::google_translate::DEFAULT_TRANSLATE_TTS_BASE_URL;
use crate::core::tts::{DEFAULT_TTS_LANGUAGE, GoogleTranslateConfig, MAX_CHUNK_CHARS};
use crate::core::worker_pool::default_worker_threads;

/// Default upload limit for multipart bodies (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// TLS configuration for HTTPS
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Hosted chat model settings
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Gemini API key; chat is disabled without it
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub system_instruction: String,
    pub timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Speech-to-text settings
#[derive(Debug, Clone, PartialEq)]
pub struct SttConfig {
    /// Whisper GGML model file
    pub model_path: PathBuf,
    pub language: String,
    pub initial_prompt: Option<String>,
    /// Size of the blocking worker pool
    pub worker_threads: usize,
    /// Concurrent model calls; 1 serializes inference
    pub max_concurrent_inference: usize,
    pub request_timeout_seconds: u64,
    /// Directory for request scratch files
    pub scratch_dir: PathBuf,
    /// `ffmpeg` used for codecs and containers the native decoder lacks; `None` disables the fallback
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: DEFAULT_LANGUAGE.to_string(),
            initial_prompt: Some(DEFAULT_INITIAL_PROMPT.to_string()),
            worker_threads: default_worker_threads(),
            max_concurrent_inference: 1,
            request_timeout_seconds: 120,
            scratch_dir: std::env::temp_dir(),
            ffmpeg_path: Some(PathBuf::from("ffmpeg")),
        }
    }
}

/// Noise reduction settings
#[derive(Debug, Clone, PartialEq)]
pub struct DenoiseConfig {
    pub stationary: bool,
    pub prop_decrease: f32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            stationary: false,
            prop_decrease: 1.0,
        }
    }
}

/// Text-to-speech settings
#[derive(Debug, Clone, PartialEq)]
pub struct TtsConfig {
    pub language: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_TTS_LANGUAGE.to_string(),
            base_url: DEFAULT_TRANSLATE_TTS_BASE_URL.to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the voice bridge, including:
/// - Server settings (host, port, TLS)
/// - Security settings (CORS, rate limiting, upload limit)
/// - Chat model, speech-to-text, noise reduction and text-to-speech settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: "*", the browser client is served from another origin
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,

    pub chat: ChatConfig,
    pub stt: SttConfig,
    pub denoise: DenoiseConfig,
    pub tts: TtsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            cors_allowed_origins: Some("*".to_string()),
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            chat: ChatConfig::default(),
            stt: SttConfig::default(),
            denoise: DenoiseConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}

impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        // Zeroize the API key to keep it out of freed memory
        if let Some(ref mut key) = self.chat.api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // The configuration priority is: YAML > Environment Variables (.env + actual ENV) > Defaults
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;

        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn has_chat_credentials(&self) -> bool {
        self.chat
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.chat.api_key.clone().unwrap_or_default(),
            model: self.chat.model.clone(),
            base_url: self.chat.base_url.clone(),
            system_instruction: self.chat.system_instruction.clone(),
            timeout: Duration::from_secs(self.chat.timeout_seconds),
        }
    }

    pub fn whisper_config(&self) -> WhisperConfig {
        WhisperConfig {
            model_path: self.stt.model_path.clone(),
            threads: None,
        }
    }

    pub fn pipeline_config(&self) -> SttPipelineConfig {
        SttPipelineConfig {
            options: TranscribeOptions {
                language: self.stt.language.clone(),
                initial_prompt: self.stt.initial_prompt.clone(),
            },
            request_timeout: Duration::from_secs(self.stt.request_timeout_seconds),
            max_concurrent_inference: self.stt.max_concurrent_inference,
        }
    }

    pub fn noise_reduction_config(&self) -> NoiseReductionConfig {
        NoiseReductionConfig {
            stationary: self.denoise.stationary,
            prop_decrease: self.denoise.prop_decrease,
            ..NoiseReductionConfig::default()
        }
    }

    pub fn ffmpeg_fallback(&self) -> Option<FfmpegFallback> {
        self.stt.ffmpeg_path.clone().map(FfmpegFallback::new)
    }

    pub fn tts_client_config(&self) -> GoogleTranslateConfig {
        GoogleTranslateConfig {
            base_url: self.tts.base_url.clone(),
            timeout: Duration::from_secs(self.tts.timeout_seconds),
            max_chunk_chars: MAX_CHUNK_CHARS,
        }
    }
}
