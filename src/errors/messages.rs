//! User-facing error messages. The client UI is Persian.

pub const CHAT_EMPTY_INPUT: &str = "پیام یا تصویر ارسالی خالی است.";
pub const CHAT_UPSTREAM_FAILED: &str = "خطا در برقراری ارتباط با مدل هوش مصنوعی.";
pub const CHAT_EMPTY_REPLY: &str = "مدل پاسخ مناسبی نداد.";

pub const STT_MODEL_NOT_LOADED: &str = "Whisper model not loaded.";
pub const STT_NO_SPEECH: &str = "گفتار قابل تشخیص نبود.";
pub const STT_PROCESSING_FAILED: &str = "خطای عمومی در پردازش صوت.";
pub const STT_MISSING_AUDIO: &str = "فایل صوتی ارسال نشده است.";

pub const TTS_INVALID_LENGTH: &str = "متن ورودی نمی‌تواند خالی یا بیش از ۵۰۰۰ کاراکتر باشد.";
pub const TTS_INVALID_TEXT: &str = "gTTS خطا داد: متن نامعتبر است.";
pub const TTS_SYNTHESIS_FAILED: &str = "خطا در تبدیل متن به گفتار.";
pub const TTS_FILE_FAILED: &str = "خطا در مدیریت فایل صوتی تولید شده.";

pub const UPLOAD_TOO_LARGE: &str = "حجم فایل ارسالی بیش از حد مجاز است.";
pub const MALFORMED_FORM: &str = "درخواست ارسالی نامعتبر است.";
