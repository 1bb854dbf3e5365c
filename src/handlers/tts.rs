use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use uuid::Uuid;

use super::form::{field_name, form_error};
use crate::core::scratch::ArtifactFormat;
use crate::errors::{AppError, AppResult, messages};
use crate::state::AppState;

/// Longest text accepted by `/tts`, in characters.
pub const MAX_TTS_CHARS: usize = 5000;

const TTS_PREFIX: &str = "tts";

/// `POST /tts` with multipart field `text`; streams back an MP3 attachment.
///
/// The synthesized audio is written to a scratch file which is deleted once
/// the response body has been sent or dropped.
pub async fn tts_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut text = String::new();
    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        if field_name(&field).as_deref() == Some("text") {
            text = field.text().await.map_err(form_error)?;
        }
    }

    let chars = text.chars().count();
    if text.is_empty() || chars > MAX_TTS_CHARS {
        return Err(AppError::Validation(messages::TTS_INVALID_LENGTH));
    }

    let request_id = Uuid::new_v4();
    info!(request_id = %request_id, chars, "TTS request received");

    let audio = state
        .synthesizer
        .synthesize(&text, &state.config.tts.language)
        .await?;

    let file = state
        .scratch
        .acquire(TTS_PREFIX, "mp3", ArtifactFormat::SynthesizedMp3, request_id)
        .await
        .map_err(|e| file_error(request_id, &e))?;
    tokio::fs::write(file.path(), &audio)
        .await
        .map_err(|e| file_error(request_id, &e))?;
    let reader = tokio::fs::File::open(file.path())
        .await
        .map_err(|e| file_error(request_id, &e))?;

    // The guard rides along with the stream and deletes the file when the body drops
    let stream = ReaderStream::new(reader).map(move |chunk| {
        let _guard = &file;
        chunk
    });

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg")),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"tts.mp3\""),
        ),
    ];
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

fn file_error(request_id: Uuid, err: &dyn std::error::Error) -> AppError {
    error!(request_id = %request_id, error = %err, "Failed to stage synthesized audio");
    AppError::Processing(messages::TTS_FILE_FAILED)
}
