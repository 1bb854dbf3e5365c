//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ServerConfig, TlsConfig};

/// Read a variable, treating unset and blank values as absent.
pub(super) fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable into `T`, naming the variable in the error.
pub(super) fn env_parse<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} ({raw:?}): {e}")),
        None => Ok(None),
    }
}

pub(super) fn env_bool(name: &str) -> Result<Option<bool>, String> {
    match env_string(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid boolean for {name}: {raw:?}")),
        },
        None => Ok(None),
    }
}

/// Build a configuration from defaults overridden by the process environment.
pub(super) fn load_from_env() -> Result<ServerConfig, String> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse("PORT")? {
        config.port = port;
    }

    config.tls = match (env_string("TLS_CERT_PATH"), env_string("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(
                "TLS requires both TLS_CERT_PATH and TLS_KEY_PATH to be set".to_string(),
            );
        }
    };

    if let Ok(origins) = env::var("CORS_ALLOWED_ORIGINS") {
        let origins = origins.trim();
        config.cors_allowed_origins = (!origins.is_empty()).then(|| origins.to_string());
    }
    if let Some(rps) = env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    if let Some(limit) = env_parse("MAX_UPLOAD_BYTES")? {
        config.max_upload_bytes = limit;
    }

    // Chat
    config.chat.api_key = env_string("GEMINI_API_KEY");
    if let Some(model) = env_string("GEMINI_MODEL") {
        config.chat.model = model;
    }
    if let Some(url) = env_string("GEMINI_BASE_URL") {
        config.chat.base_url = url;
    }
    if let Some(timeout) = env_parse("CHAT_TIMEOUT_SECONDS")? {
        config.chat.timeout_seconds = timeout;
    }

    // Speech-to-text
    if let Some(path) = env_string("WHISPER_MODEL_PATH") {
        config.stt.model_path = PathBuf::from(path);
    }
    if let Some(language) = env_string("STT_LANGUAGE") {
        config.stt.language = language;
    }
    if let Ok(prompt) = env::var("STT_INITIAL_PROMPT") {
        config.stt.initial_prompt = (!prompt.trim().is_empty()).then_some(prompt);
    }
    if let Some(workers) = env_parse("STT_WORKER_THREADS")? {
        config.stt.worker_threads = workers;
    }
    if let Some(permits) = env_parse("STT_MAX_CONCURRENT_INFERENCE")? {
        config.stt.max_concurrent_inference = permits;
    }
    if let Some(timeout) = env_parse("STT_REQUEST_TIMEOUT_SECONDS")? {
        config.stt.request_timeout_seconds = timeout;
    }
    if let Some(dir) = env_string("SCRATCH_DIR") {
        config.stt.scratch_dir = PathBuf::from(dir);
    }
    // An explicitly empty FFMPEG_PATH disables the fallback
    if let Ok(path) = env::var("FFMPEG_PATH") {
        let path = path.trim();
        config.stt.ffmpeg_path = (!path.is_empty()).then(|| PathBuf::from(path));
    }

    // Noise reduction
    if let Some(stationary) = env_bool("DENOISE_STATIONARY")? {
        config.denoise.stationary = stationary;
    }
    if let Some(prop) = env_parse("DENOISE_PROP_DECREASE")? {
        config.denoise.prop_decrease = prop;
    }

    // Text-to-speech
    if let Some(language) = env_string("TTS_LANGUAGE") {
        config.tts.language = language;
    }
    if let Some(url) = env_string("TTS_BASE_URL") {
        config.tts.base_url = url;
    }

    Ok(config)
}
