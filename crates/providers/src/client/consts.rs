pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

pub const OPENAI_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";
pub const SPEECH_MODEL: &str = "tts-1";
pub const SPEECH_VOICE: &str = "echo";
pub const SPEECH_SPEED: f32 = 1.0;
pub const SPEECH_FORMAT: &str = "mp3";

pub const CHAT_TEMPERATURE: f32 = 0.8;
pub const MAX_REPLY_TOKENS: u32 = 200;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_KEY_HEADER: &str = "x-api-key";
pub const ANTHROPIC_VERSION_HEADER: &str = "anthropic-version";
