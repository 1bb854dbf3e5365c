use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::form::{field_name, form_error};
use crate::core::stt::{TranscriptResult, UploadedAudio};
use crate::errors::{AppError, AppResult, messages};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub transcript: String,
    /// Set when the audio held no recognizable speech
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// `POST /stt` with the recording in the multipart field `audio`.
pub async fn stt_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<TranscriptResponse>> {
    if !state.stt.is_loaded() {
        return Err(AppError::DependencyUnavailable(messages::STT_MODEL_NOT_LOADED));
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        if field_name(&field).as_deref() != Some("audio") {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(form_error)?;

        let mut audio = UploadedAudio::new(bytes);
        if let Some(content_type) = content_type {
            audio = audio.with_content_type(content_type);
        }
        if let Some(file_name) = file_name {
            audio = audio.with_file_name(file_name);
        }
        upload = Some(audio);
    }

    let upload = upload.ok_or(AppError::Validation(messages::STT_MISSING_AUDIO))?;
    info!(bytes = upload.bytes.len(), "STT upload received");

    let response = match state.stt.process(upload).await? {
        TranscriptResult::Text(transcript) => TranscriptResponse {
            transcript,
            error: None,
        },
        TranscriptResult::NoSpeech => TranscriptResponse {
            transcript: String::new(),
            error: Some(messages::STT_NO_SPEECH),
        },
    };
    Ok(Json(response))
}
