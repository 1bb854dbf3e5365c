//! Google Translate speech endpoint (the service behind gTTS).
//!
//! - Endpoint: `GET {base_url}/translate_tts`
//! - Query: `ie=UTF-8`, `q` (≤ 100 chars), `tl` (language), `client=tw-ob`,
//!   `total`, `idx`, `textlen`
//! - Output: `audio/mpeg`
//!
//! No API key is needed. Chunks are requested in order and their MP3 frames
//! concatenated, which players handle as one stream.

mod config;
mod provider;

pub use config::{DEFAULT_TRANSLATE_TTS_BASE_URL, GoogleTranslateConfig};
pub use provider::GoogleTranslateTts;
