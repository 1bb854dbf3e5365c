//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `chat` - Chat with the hosted language model
//! - `stt` - Speech-to-text upload endpoint
//! - `tts` - Text-to-speech download endpoint

pub mod api;
pub mod chat;
mod form;
pub mod stt;
pub mod tts;

pub use api::health_check;
pub use chat::chat_handler;
pub use stt::stt_handler;
pub use tts::tts_handler;
