use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::form::{field_name, form_error};
use crate::core::llm::ChatRequest;
use crate::errors::{AppError, AppResult, messages};
use crate::state::AppState;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// `POST /chat` with multipart fields `message` (text) and `image` (file),
/// both optional but not both empty.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<ChatResponse>> {
    let mut request = ChatRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        match field_name(&field).as_deref() {
            Some("message") => {
                request.message = field.text().await.map_err(form_error)?;
            }
            Some("image") => {
                let mime_type = field
                    .content_type()
                    .filter(|ct| ct.starts_with("image/"))
                    .unwrap_or(DEFAULT_IMAGE_MIME)
                    .to_string();
                let bytes = field.bytes().await.map_err(form_error)?;
                if !bytes.is_empty() {
                    request = request.with_image(bytes, mime_type);
                }
            }
            other => debug!(field = ?other, "Ignoring unknown chat form field"),
        }
    }

    if request.is_empty() {
        return Err(AppError::Validation(messages::CHAT_EMPTY_INPUT));
    }

    info!(
        has_image = request.image.is_some(),
        message_chars = request.message.chars().count(),
        "Chat request received"
    );

    let reply = state.chat.generate(request).await?;
    Ok(Json(ChatResponse { reply }))
}
