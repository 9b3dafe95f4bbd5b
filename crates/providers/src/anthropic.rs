use crate::client::config::Config;
use crate::client::{self, consts};
use anyhow::Result;
use async_trait::async_trait;
use companion_core::responder::ChatProvider;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "anthropic";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages API client, used as the secondary provider.
pub struct AnthropicChat {
    client: Client,
    config: Config,
}

impl AnthropicChat {
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicChat {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let body = MessagesRequest {
            model: self.config.model(),
            max_tokens: consts::MAX_REPLY_TOKENS,
            system: system_prompt,
            messages: [UserTurn {
                role: "user",
                content: user_text,
            }],
        };

        let request = self
            .client
            .post(self.config.endpoint("messages"))
            .header(
                consts::ANTHROPIC_KEY_HEADER,
                self.config.api_key().expose_secret(),
            )
            .header(consts::ANTHROPIC_VERSION_HEADER, consts::ANTHROPIC_VERSION)
            .json(&body);
        let resp: MessagesResponse = client::send_json(PROVIDER, request).await?;

        let text = resp
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .unwrap_or_default();
        Ok(text.trim().to_string())
    }
}
