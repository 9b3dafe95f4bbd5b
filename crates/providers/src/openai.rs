use crate::client::config::Config;
use crate::client::{self, consts};
use anyhow::Result;
use async_trait::async_trait;
use companion_core::responder::ChatProvider;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions client.
pub struct OpenAiChat {
    client: Client,
    config: Config,
}

impl OpenAiChat {
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let body = ChatCompletionRequest {
            model: self.config.model(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            temperature: consts::CHAT_TEMPERATURE,
            max_tokens: consts::MAX_REPLY_TOKENS,
        };

        let request = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(self.config.api_key().expose_secret())
            .json(&body);
        let resp: ChatCompletionResponse = client::send_json(PROVIDER, request).await?;

        // no choices or null content is an empty answer, not a failure
        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }
}
