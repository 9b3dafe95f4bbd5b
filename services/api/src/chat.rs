use crate::AppState;
use crate::error::ChatError;
use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{Extensions, HeaderMap, StatusCode};
use bytes::Bytes;
use chrono::Local;
use companion_core::throttle::{Admission, SessionKey};
use companion_core::wire::{ChatRequest, ChatResponse, CompanionMessage, UserMessage};
use std::net::SocketAddr;
use std::time::Instant;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// `POST /chat`.
///
/// The body is parsed by hand so malformed input still gets a JSON error
/// rather than axum's plain-text rejection.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Result<Json<ChatResponse>, ChatError> {
    let request = parse_request(&body)?;

    let forwarded_for = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok());
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let key = SessionKey::resolve(request.wallet_address.as_deref(), forwarded_for, peer);

    if let Admission::Reject { remaining_seconds } = state.throttle.admit(&key, Instant::now()) {
        return Err(ChatError::Throttled { remaining_seconds });
    }

    tracing::info!(
        "chat from {} ({} chars, {})",
        key.as_str(),
        request.content.chars().count(),
        request.language
    );

    let accepted_at = Local::now();
    let generator = state.generator.clone();
    let content = request.content.clone();
    let language = request.language;
    let reply = match tokio::spawn(async move { generator.generate(&content, language).await })
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!("reply generation crashed: {}", e);
            return Err(ChatError::Internal {
                content: request.content,
                username: request.username,
                language: request.language,
            });
        }
    };

    Ok(Json(ChatResponse {
        user_message: UserMessage::new(
            request.content,
            request.username.as_deref(),
            accepted_at,
        ),
        cz_message: CompanionMessage::new(reply.message, reply.affect, reply.audio, accepted_at),
        analytics: reply.analytics,
    }))
}

fn parse_request(body: &[u8]) -> Result<ChatRequest, ChatError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ChatError::MissingBody);
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| ChatError::InvalidJson)?;
    if value.is_null() {
        return Err(ChatError::MissingBody);
    }
    ChatRequest::from_json(&value).map_err(ChatError::Invalid)
}

/// Bare `OPTIONS` requests that are not CORS preflights.
pub async fn options() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> ChatError {
    ChatError::MethodNotAllowed
}

pub async fn not_found() -> ChatError {
    ChatError::NotFound
}
