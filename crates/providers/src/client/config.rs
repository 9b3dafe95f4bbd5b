use super::consts;
use secrecy::{ExposeSecret, SecretString};

/// Endpoint, credentials and model for one hosted API.
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            config: Config {
                base_url: base_url.to_string(),
                api_key: SecretString::from(String::new()),
                model: model.to_string(),
            },
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Config {
    pub fn openai_chat() -> ConfigBuilder {
        ConfigBuilder::new(consts::OPENAI_BASE_URL, consts::OPENAI_CHAT_MODEL)
    }

    pub fn anthropic() -> ConfigBuilder {
        ConfigBuilder::new(consts::ANTHROPIC_BASE_URL, consts::ANTHROPIC_MODEL)
    }

    pub fn openai_speech() -> ConfigBuilder {
        ConfigBuilder::new(consts::OPENAI_BASE_URL, consts::SPEECH_MODEL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}
