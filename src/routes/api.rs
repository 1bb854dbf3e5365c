use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, chat, stt, tts};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
///
/// Multipart bodies larger than `max_upload_bytes` are rejected with 413.
pub fn create_api_router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/chat", post(chat::chat_handler))
        .route("/stt", post(stt::stt_handler))
        .route("/tts", post(tts::tts_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
