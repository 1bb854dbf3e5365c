//! Text-to-speech.
//!
//! [`SpeechSynthesizer`] turns text into a complete MP3 payload. The only
//! implementation is the public Google Translate speech endpoint
//! ([`google_translate`]), which accepts short snippets; longer text is split
//! with [`split_text`] and the per-chunk MP3 streams are concatenated.

pub mod google_translate;

pub use google_translate::{GoogleTranslateConfig, GoogleTranslateTts};

use async_trait::async_trait;
use bytes::Bytes;

/// Default synthesis language (Persian).
pub const DEFAULT_TTS_LANGUAGE: &str = "fa";

/// Characters accepted per upstream request.
pub const MAX_CHUNK_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// Nothing speakable in the input
    #[error("Text is empty or contains nothing to speak")]
    InvalidInput,

    #[error("Request to speech service failed: {0}")]
    Transport(String),

    #[error("Speech service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Speech service returned no audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        TtsError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Synthesize `text` in `language`, returning MP3 bytes.
    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes, TtsError>;
}

const SENTENCE_END: &[char] = &['.', '!', '?', '؟', '؛', ';', '…'];

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Breaks fall on whitespace, preferring sentence ends. A single word longer
/// than `max_chars` is cut at character boundaries.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let mut flush = |current: &mut String, current_len: &mut usize| {
        if !current.is_empty() {
            chunks.push(std::mem::take(current));
        }
        *current_len = 0;
    };

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            let needed = if current_len == 0 {
                piece.len()
            } else {
                current_len + 1 + piece.len()
            };
            if needed > max_chars {
                flush(&mut current, &mut current_len);
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(piece);
            current_len += piece.len();
        }
        if word.ends_with(SENTENCE_END) {
            flush(&mut current, &mut current_len);
        }
    }
    flush(&mut current, &mut current_len);

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_text("سلام دنیا", 100), vec!["سلام دنیا"]);
    }

    #[test]
    fn test_whitespace_only_has_no_chunks() {
        assert!(split_text("  \n\t ", 100).is_empty());
        assert!(split_text("", 100).is_empty());
    }

    #[test]
    fn test_chunks_respect_limit_and_keep_words() {
        let text = "word ".repeat(60);
        let chunks = split_text(&text, 100);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), 60);
    }

    #[test]
    fn test_sentence_end_breaks_chunk() {
        let chunks = split_text("اول. دوم؟ سوم", 100);
        assert_eq!(chunks, vec!["اول.", "دوم؟", "سوم"]);
    }

    #[test]
    fn test_long_word_is_cut_by_chars() {
        let word = "آ".repeat(250);
        let chunks = split_text(&word, 100);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![100, 100, 50]);
    }
}
