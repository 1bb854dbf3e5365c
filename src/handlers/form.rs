use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use tracing::warn;

use crate::errors::{AppError, messages};

/// Map a multipart read failure to a client error.
pub(super) fn form_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %err.body_text(), "Upload exceeds the body limit");
        AppError::PayloadTooLarge(messages::UPLOAD_TOO_LARGE)
    } else {
        warn!(error = %err.body_text(), "Malformed multipart form");
        AppError::Validation(messages::MALFORMED_FORM)
    }
}

/// Owned name of a form field.
pub(super) fn field_name(field: &Field<'_>) -> Option<String> {
    field.name().map(str::to_owned)
}
