use async_trait::async_trait;
use companion_core::wire::{ChatRequest, ChatResponse, CompanionMessage};
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

/// Fields the server may put in any non-200 body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub remaining_time: Option<u64>,
    #[serde(default)]
    pub cz_message: Option<CompanionMessage>,
}

/// What the server answered, once the body has been parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Replied(ChatResponse),
    Throttled(ErrorEnvelope),
    Failed {
        status: u16,
        envelope: ErrorEnvelope,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server returned non-JSON response (status {status})")]
    NotJson { status: u16 },
    #[error("Invalid response from server: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Delivers one chat request to the server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_chat(&self, request: ChatRequest) -> Result<ChatOutcome, TransportError>;
}

/// `POST {server}/chat` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(server_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat", server_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn post_chat(&self, request: ChatRequest) -> Result<ChatOutcome, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));
        if !is_json {
            return Err(TransportError::NotJson {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        tracing::debug!("chat response {} ({} bytes)", status, body.len());

        let outcome = match status {
            StatusCode::OK => ChatOutcome::Replied(serde_json::from_slice(&body)?),
            StatusCode::TOO_MANY_REQUESTS => ChatOutcome::Throttled(serde_json::from_slice(&body)?),
            _ => ChatOutcome::Failed {
                status: status.as_u16(),
                envelope: serde_json::from_slice(&body)?,
            },
        };
        Ok(outcome)
    }
}
