use std::time::Duration;

use crate::core::tts::MAX_CHUNK_CHARS;

pub const DEFAULT_TRANSLATE_TTS_BASE_URL: &str = "https://translate.google.com";

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleTranslateConfig {
    pub base_url: String,
    /// Timeout per chunk request
    pub timeout: Duration,
    pub max_chunk_chars: usize,
}

impl Default for GoogleTranslateConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRANSLATE_TTS_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_chunk_chars: MAX_CHUNK_CHARS,
        }
    }
}

impl GoogleTranslateConfig {
    pub fn endpoint(&self) -> String {
        format!("{}/translate_tts", self.base_url.trim_end_matches('/'))
    }
}
