use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use tracing::debug;

use super::config::GoogleTranslateConfig;
use crate::core::tts::{SpeechSynthesizer, TtsError, split_text};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct GoogleTranslateTts {
    http_client: Client,
    endpoint: String,
    max_chunk_chars: usize,
}

impl GoogleTranslateTts {
    pub fn new(config: GoogleTranslateConfig) -> Result<Self, TtsError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TtsError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint(),
            max_chunk_chars: config.max_chunk_chars,
        })
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        language: &str,
        idx: usize,
        total: usize,
    ) -> Result<Bytes, TtsError> {
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                message: body.chars().take(300).collect(),
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        Ok(audio)
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google-translate"
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes, TtsError> {
        let chunks = split_text(text, self.max_chunk_chars);
        if chunks.is_empty() {
            return Err(TtsError::InvalidInput);
        }

        let mut audio = BytesMut::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let bytes = self.fetch_chunk(chunk, language, idx, chunks.len()).await?;
            audio.extend_from_slice(&bytes);
        }

        debug!(
            chunks = chunks.len(),
            bytes = audio.len(),
            language,
            "Synthesized speech"
        );
        Ok(audio.freeze())
    }
}
