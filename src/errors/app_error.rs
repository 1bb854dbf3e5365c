//! Handler-boundary error type.
//!
//! Component errors are converted into [`AppError`] by the handlers. Internal
//! causes are logged here and never reach the client; the response body is
//! always `{"error": "<message>"}` with a localized message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use super::messages;
use crate::core::llm::ChatError;
use crate::core::stt::SttError;
use crate::core::tts::TtsError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad client input; 400
    #[error("{0}")]
    Validation(&'static str),

    /// A required model or client is not available; 500
    #[error("{0}")]
    DependencyUnavailable(&'static str),

    /// Request body over the upload limit; 413
    #[error("{0}")]
    PayloadTooLarge(&'static str),

    /// Processing failed; 500 with a generic message
    #[error("{0}")]
    Processing(&'static str),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::DependencyUnavailable(_) | AppError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AppError::Validation(m)
            | AppError::PayloadTooLarge(m)
            | AppError::DependencyUnavailable(m)
            | AppError::Processing(m) => *m,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<SttError> for AppError {
    fn from(err: SttError) -> Self {
        match err {
            SttError::ModelUnavailable => {
                AppError::DependencyUnavailable(messages::STT_MODEL_NOT_LOADED)
            }
            other => {
                error!(error = %other, "STT processing failed");
                AppError::Processing(messages::STT_PROCESSING_FAILED)
            }
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyResponse => {
                error!("Chat model returned an empty reply");
                AppError::Processing(messages::CHAT_EMPTY_REPLY)
            }
            ChatError::NotConfigured => {
                error!("Chat requested but no API key is configured");
                AppError::DependencyUnavailable(messages::CHAT_UPSTREAM_FAILED)
            }
            other => {
                error!(error = %other, "Chat model call failed");
                AppError::DependencyUnavailable(messages::CHAT_UPSTREAM_FAILED)
            }
        }
    }
}

impl From<TtsError> for AppError {
    fn from(err: TtsError) -> Self {
        match err {
            TtsError::InvalidInput => {
                error!("Speech synthesis rejected the text");
                AppError::Processing(messages::TTS_INVALID_TEXT)
            }
            other => {
                error!(error = %other, "Speech synthesis failed");
                AppError::Processing(messages::TTS_SYNTHESIS_FAILED)
            }
        }
    }
}
