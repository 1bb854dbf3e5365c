//! Applies YAML overrides on top of the environment configuration.

use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, String> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) => {}
                    _ => {
                        return Err(
                            "TLS in YAML requires both cert_path and key_path".to_string(),
                        );
                    }
                }
            }
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            let origins = origins.trim().to_string();
            config.cors_allowed_origins = (!origins.is_empty()).then_some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(limit) = security.max_upload_bytes {
            config.max_upload_bytes = limit;
        }
    }

    if let Some(chat) = yaml.chat {
        if let Some(key) = chat.api_key {
            config.chat.api_key = Some(key);
        }
        if let Some(model) = chat.model {
            config.chat.model = model;
        }
        if let Some(url) = chat.base_url {
            config.chat.base_url = url;
        }
        if let Some(instruction) = chat.system_instruction {
            config.chat.system_instruction = instruction;
        }
        if let Some(timeout) = chat.timeout_seconds {
            config.chat.timeout_seconds = timeout;
        }
    }

    if let Some(stt) = yaml.stt {
        if let Some(path) = stt.model_path {
            config.stt.model_path = PathBuf::from(path);
        }
        if let Some(language) = stt.language {
            config.stt.language = language;
        }
        if let Some(prompt) = stt.initial_prompt {
            config.stt.initial_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        }
        if let Some(workers) = stt.worker_threads {
            config.stt.worker_threads = workers;
        }
        if let Some(permits) = stt.max_concurrent_inference {
            config.stt.max_concurrent_inference = permits;
        }
        if let Some(timeout) = stt.request_timeout_seconds {
            config.stt.request_timeout_seconds = timeout;
        }
        if let Some(dir) = stt.scratch_dir {
            config.stt.scratch_dir = PathBuf::from(dir);
        }
        if let Some(path) = stt.ffmpeg_path {
            let path = path.trim().to_string();
            config.stt.ffmpeg_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
    }

    if let Some(denoise) = yaml.denoise {
        if let Some(stationary) = denoise.stationary {
            config.denoise.stationary = stationary;
        }
        if let Some(prop) = denoise.prop_decrease {
            config.denoise.prop_decrease = prop;
        }
    }

    if let Some(tts) = yaml.tts {
        if let Some(language) = tts.language {
            config.tts.language = language;
        }
        if let Some(url) = tts.base_url {
            config.tts.base_url = url;
        }
        if let Some(timeout) = tts.timeout_seconds {
            config.tts.timeout_seconds = timeout;
        }
    }

    Ok(config)
}
