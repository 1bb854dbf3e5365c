use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub stt_model_loaded: bool,
    pub chat_ready: bool,
}

/// Liveness plus readiness of the model-backed endpoints. Always 200.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stt_model_loaded: state.stt.is_loaded(),
        chat_ready: state.chat.is_ready(),
    })
}
