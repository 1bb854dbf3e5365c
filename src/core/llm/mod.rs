//! Hosted language-model chat.
//!
//! [`ChatModel`] is the seam the `/chat` handler talks to; [`gemini`] holds
//! the Google Gemini `generateContent` implementation.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

use async_trait::async_trait;
use bytes::Bytes;

/// Default Gemini model.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

/// Persona sent with every chat request: a Persian assistant that keeps
/// answers short unless asked for code or a table.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = concat!(
    "شما یک دستیار هوش مصنوعی ایرانی هستید. ",
    "وظیفه شما پاسخ دادن به سوالات کاربر به زبان فارسی است. ",
    "**قانون عمومی:** در حالت عادی، پاسخ‌های شما باید مختصر و در حد یک یا دو خط باشند.",
    "**قانون کد و جدول (حیاتی):** اگر کاربر درخواست کد یا جدول داد، قانون اختصار را نادیده بگیرید و پاسخ خود را *کامل* و *جامع* برگردانید. تمام محتوای پاسخ را به صورت زیر برگردانید: ",
    "1. برای کد (مثل Python, HTML, JS)، *فقط* بلوک کد کامل را در ```[زبان]\n[کد کامل]``` قرار دهید. ",
    "2. برای جدول‌ها، *فقط* ساختار کامل مارک‌داون را برگردانید و مطمئن شوید که *تمام* جوانب ضروری درخواستی کاربر را پوشش می‌دهید. ",
    "**ممنوع:** از نوشتن هرگونه مقدمه یا موخره قبل یا بعد از بلوک کد/جدول، *اکیداً* خودداری کنید. ",
    "**الگوی خروجی جدول (اجباری):** خروجی جدول شما *باید* دقیقاً شبیه این الگو باشد و هیچ ردیف یا ستونی نباید خالی بماند: ",
    "| ویژگی | نام یک موجودیت | نام موجودیت دیگر |",
    "|---|---|---|",
    "| مورد اول | محتوای یک | محتوای دو |",
    "| مورد دوم | محتوای سه | محتوای چهار |",
    "| مورد سوم | محتوای پنج | محتوای شش |",
    "**لحن پاسخ خود را بر اساس لحن ورودی کاربر تنظیم کنید.**",
);

/// Image attached to a chat message.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Bytes,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub image: Option<ImageInput>,
}

impl ChatRequest {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        self.image = Some(ImageInput {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        });
        self
    }

    /// True when there is neither non-blank text nor an image.
    pub fn is_empty(&self) -> bool {
        self.message.trim().is_empty() && self.image.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat model is not configured")]
    NotConfigured,

    #[error("Request to chat model failed: {0}")]
    Transport(String),

    #[error("Chat model returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected chat model response: {0}")]
    InvalidResponse(String),

    #[error("Chat model returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::InvalidResponse(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

/// A hosted model that answers one message (optionally with an image).
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Whether the client has what it needs (API key) to make calls.
    fn is_ready(&self) -> bool;

    fn model_name(&self) -> &str;

    /// Generate a reply. Implementations make exactly one upstream call.
    async fn generate(&self, request: ChatRequest) -> Result<String, ChatError>;
}
