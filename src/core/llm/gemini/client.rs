use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::config::GeminiConfig;
use super::messages::{Content, ErrorResponse, GenerateContentRequest, GenerateContentResponse, Part};
use crate::core::llm::{ChatError, ChatModel, ChatRequest};

/// Gemini REST client. One HTTP call per [`ChatModel::generate`], no retries.
pub struct GeminiClient {
    http_client: Client,
    api_key: Zeroizing<String>,
    endpoint: String,
    model: String,
    system_instruction: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("configured", &!self.api_key.is_empty())
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ChatError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| ChatError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint(),
            api_key: Zeroizing::new(config.api_key.trim().to_string()),
            model: config.model,
            system_instruction: config.system_instruction,
        })
    }

    fn build_request(&self, request: &ChatRequest) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(2);
        if !request.message.trim().is_empty() {
            parts.push(Part::text(request.message.clone()));
        }
        if let Some(image) = &request.image {
            parts.push(Part::inline(
                image.mime_type.clone(),
                STANDARD.encode(&image.bytes),
            ));
        }

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(self.system_instruction.clone())],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
        }
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: ChatRequest) -> Result<String, ChatError> {
        if !self.is_ready() {
            return Err(ChatError::NotConfigured);
        }

        let body = self.build_request(&request);
        debug!(
            model = %self.model,
            has_image = request.image.is_some(),
            message_chars = request.message.chars().count(),
            "Sending Gemini request"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorResponse>(&response_text) {
                Ok(err) => format!("{} ({})", err.error.message, err.error.status),
                Err(_) => response_text.chars().take(500).collect(),
            };
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| ChatError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let text = parsed.text();
        if text.trim().is_empty() {
            if let Some(reason) = parsed
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                warn!(block_reason = reason, "Gemini blocked the prompt");
            }
            return Err(ChatError::EmptyResponse);
        }

        Ok(text)
    }
}
