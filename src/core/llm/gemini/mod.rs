//! Google Gemini chat client.
//!
//! Calls the REST `generateContent` endpoint once per chat message:
//!
//! - Endpoint: `POST {base_url}/v1beta/models/{model}:generateContent`
//! - Auth: `x-goog-api-key` header
//! - Input: system instruction, user text and an optional inline image
//!   (base64 `inline_data`)
//! - Output: the text parts of the first candidate, concatenated

mod client;
mod config;
pub mod messages;

pub use client::GeminiClient;
pub use config::{DEFAULT_GEMINI_BASE_URL, GeminiConfig};
