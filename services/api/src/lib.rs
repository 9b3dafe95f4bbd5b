//! HTTP service for the judge companion.
//!
//! `POST /chat` admits the request through the per-session throttle, runs the
//! response generator and answers with the user/companion message pair.

pub mod chat;
pub mod config;
pub mod error;
pub mod prompt_loader;

use axum::Router;
use axum::http::header::{
    CONTENT_TYPE, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    X_XSS_PROTECTION,
};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::post;
use companion_core::responder::ResponseGenerator;
use companion_core::throttle::SessionThrottle;
use companion_providers::{AnthropicChat, Config as ProviderConfig, OpenAiChat, OpenAiSpeech};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub throttle: Arc<SessionThrottle>,
    pub generator: Arc<ResponseGenerator>,
}

impl AppState {
    pub fn new(generator: ResponseGenerator) -> Self {
        Self {
            throttle: Arc::new(SessionThrottle::in_memory()),
            generator: Arc::new(generator),
        }
    }
}

/// Builds the provider chain from the configured keys: OpenAI first, then
/// Anthropic. Speech needs the OpenAI key.
pub fn generator_from_config(config: &Config, persona: Option<String>) -> ResponseGenerator {
    let mut generator = ResponseGenerator::new();
    if let Some(persona) = persona {
        generator = generator.with_persona(persona);
    }

    if let Some(key) = &config.openai_api_key {
        let chat = ProviderConfig::openai_chat()
            .with_api_key(key.expose_secret())
            .with_model(&config.openai_chat_model)
            .build();
        let speech = ProviderConfig::openai_speech()
            .with_api_key(key.expose_secret())
            .with_model(&config.tts_model)
            .build();
        generator = generator
            .with_provider(Arc::new(OpenAiChat::new(chat)))
            .with_speech(Arc::new(
                OpenAiSpeech::new(speech).with_voice(&config.tts_voice),
            ));
    }

    if let Some(key) = &config.anthropic_api_key {
        let chat = ProviderConfig::anthropic()
            .with_api_key(key.expose_secret())
            .with_model(&config.anthropic_model)
            .build();
        generator = generator.with_provider(Arc::new(AnthropicChat::new(chat)));
    }

    generator
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route(
            "/chat",
            post(chat::chat)
                .options(chat::options)
                .fallback(chat::method_not_allowed),
        )
        .fallback(chat::not_found)
        .with_state(state)
        .layer(cors)
        .layer(security_header(
            STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        ))
        .layer(security_header(X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(X_FRAME_OPTIONS, "DENY"))
        .layer(security_header(X_XSS_PROTECTION, "1; mode=block"))
        .layer(TraceLayer::new_for_http())
}
