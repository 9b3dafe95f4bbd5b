use crate::client::config::Config;
use crate::client::{self, ProviderError, consts};
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use companion_core::AudioClip;
use companion_core::responder::SpeechSynthesizer;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;

const PROVIDER: &str = "openai-speech";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

/// OpenAI text-to-speech client. Returns MP3 audio as base64.
pub struct OpenAiSpeech {
    client: Client,
    config: Config,
    voice: String,
}

impl OpenAiSpeech {
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(),
            config,
            voice: consts::SPEECH_VOICE.to_string(),
        }
    }

    pub fn with_voice(mut self, voice: &str) -> Self {
        self.voice = voice.to_string();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let body = SpeechRequest {
            model: self.config.model(),
            input: text,
            voice: &self.voice,
            speed: consts::SPEECH_SPEED,
            response_format: consts::SPEECH_FORMAT,
        };

        let request = self
            .client
            .post(self.config.endpoint("audio/speech"))
            .bearer_auth(self.config.api_key().expose_secret())
            .json(&body);
        let bytes = client::send(PROVIDER, request)
            .await?
            .bytes()
            .await
            .map_err(|source| ProviderError::Request {
                provider: PROVIDER,
                source,
            })?;

        if bytes.is_empty() {
            return Err(ProviderError::Empty { provider: PROVIDER }.into());
        }
        tracing::debug!("synthesized {} bytes of speech", bytes.len());
        Ok(AudioClip::new(STANDARD.encode(&bytes)))
    }
}
