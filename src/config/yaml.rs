use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   tls:
///     cert_path: "/etc/certs/cert.pem"
///     key_path: "/etc/certs/key.pem"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_upload_bytes: 26214400
///
/// chat:
///   api_key: "your-gemini-key"
///   model: "gemini-2.5-flash"
///   timeout_seconds: 60
///
/// stt:
///   model_path: "models/ggml-base.bin"
///   language: "fa"
///   worker_threads: 4
///   max_concurrent_inference: 1
///   request_timeout_seconds: 120
///   scratch_dir: "/tmp/voice-bridge"
///   ffmpeg_path: "/usr/bin/ffmpeg"
///
/// denoise:
///   stationary: false
///   prop_decrease: 1.0
///
/// tts:
///   language: "fa"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub security: Option<SecurityYaml>,
    pub chat: Option<ChatYaml>,
    pub stt: Option<SttYaml>,
    pub denoise: Option<DenoiseYaml>,
    pub tts: Option<TtsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChatYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub system_instruction: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SttYaml {
    pub model_path: Option<String>,
    pub language: Option<String>,
    pub initial_prompt: Option<String>,
    pub worker_threads: Option<usize>,
    pub max_concurrent_inference: Option<usize>,
    pub request_timeout_seconds: Option<u64>,
    pub scratch_dir: Option<String>,
    /// Empty string disables the ffmpeg fallback
    pub ffmpeg_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DenoiseYaml {
    pub stationary: Option<bool>,
    pub prop_decrease: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub language: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
