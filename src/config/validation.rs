//! Configuration validation.

use super::ServerConfig;

pub(super) fn validate(config: &ServerConfig) -> Result<(), String> {
    if config.stt.worker_threads == 0 {
        return Err("STT worker_threads must be at least 1".to_string());
    }
    if config.stt.max_concurrent_inference == 0 {
        return Err("STT max_concurrent_inference must be at least 1".to_string());
    }
    if config.stt.request_timeout_seconds == 0 {
        return Err("STT request_timeout_seconds must be greater than 0".to_string());
    }
    if config.stt.language.trim().is_empty() {
        return Err("STT language must not be empty".to_string());
    }
    if !(0.0..=1.0).contains(&config.denoise.prop_decrease) {
        return Err(format!(
            "Denoise prop_decrease must be within [0, 1], got {}",
            config.denoise.prop_decrease
        ));
    }
    if config.max_upload_bytes == 0 {
        return Err("max_upload_bytes must be greater than 0".to_string());
    }
    if config.chat.timeout_seconds == 0 || config.tts.timeout_seconds == 0 {
        return Err("Chat and TTS timeouts must be greater than 0".to_string());
    }
    if let Some(tls) = &config.tls {
        if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
            return Err("TLS requires both a certificate and a key path".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;
    use std::path::PathBuf;

    #[test]
    fn test_default_is_valid() {
        assert!(validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = ServerConfig::default();
        config.stt.max_concurrent_inference = 0;
        assert!(validate(&config).unwrap_err().contains("max_concurrent_inference"));

        let mut config = ServerConfig::default();
        config.stt.request_timeout_seconds = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_prop_decrease_range() {
        let mut config = ServerConfig::default();
        config.denoise.prop_decrease = 1.2;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_half_configured_tls_rejected() {
        let mut config = ServerConfig::default();
        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("/tmp/cert.pem"),
            key_path: PathBuf::new(),
        });
        assert!(validate(&config).unwrap_err().contains("TLS"));
    }
}
