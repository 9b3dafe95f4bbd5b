use companion_providers::consts;
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: Option<SecretString>,
    pub anthropic_api_key: Option<SecretString>,
    pub openai_chat_model: String,
    pub anthropic_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub prompts_dir: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables, reading `.env` first.
    ///
    /// *   `BIND_ADDRESS`: address and port to listen on. Defaults to "0.0.0.0:3000".
    /// *   `OPENAI_API_KEY`: (Optional) enables the OpenAI chat provider and speech.
    /// *   `ANTHROPIC_API_KEY`: (Optional) enables the Anthropic fallback provider.
    /// *   `OPENAI_CHAT_MODEL`, `ANTHROPIC_MODEL`, `TTS_MODEL`, `TTS_VOICE`: (Optional) model overrides.
    /// *   `PROMPTS_DIR`: (Optional) directory holding `persona.md`. Defaults to "prompts".
    /// *   `RUST_LOG`: (Optional) the logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let var_or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key: var(consts::OPENAI_API_KEY).map(SecretString::from),
            anthropic_api_key: var(consts::ANTHROPIC_API_KEY).map(SecretString::from),
            openai_chat_model: var_or("OPENAI_CHAT_MODEL", consts::OPENAI_CHAT_MODEL),
            anthropic_model: var_or("ANTHROPIC_MODEL", consts::ANTHROPIC_MODEL),
            tts_model: var_or("TTS_MODEL", consts::SPEECH_MODEL),
            tts_voice: var_or("TTS_VOICE", consts::SPEECH_VOICE),
            prompts_dir: PathBuf::from(var_or("PROMPTS_DIR", "prompts")),
            log_level,
        })
    }
}
