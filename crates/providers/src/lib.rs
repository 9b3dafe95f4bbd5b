//! HTTP clients for the hosted language-model and speech APIs.
//!
//! Each client implements one of the `companion-core` provider traits so the
//! response generator can chain them without knowing which vendor answers.

mod anthropic;
mod client;
mod openai;
mod speech;

pub use anthropic::AnthropicChat;
pub use client::ProviderError;
pub use client::config::{Config, ConfigBuilder};
pub use client::consts;
pub use openai::OpenAiChat;
pub use speech::OpenAiSpeech;
