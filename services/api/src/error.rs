use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Local;
use companion_core::responder::unavailable_message;
use companion_core::wire::{
    CompanionMessage, ErrorBody, FailureBody, ThrottledBody, UserMessage, ValidationIssue,
};
use companion_core::{AffectLabel, Language};

/// Everything `POST /chat` can answer besides a reply. Each variant renders
/// as a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid JSON in request body")]
    InvalidJson,
    #[error("Request body is required")]
    MissingBody,
    #[error("Invalid request data")]
    Invalid(Vec<ValidationIssue>),
    #[error("Please wait {remaining_seconds} seconds before sending another message.")]
    Throttled { remaining_seconds: u64 },
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Not found")]
    NotFound,
    /// Generation broke down. Carries enough of the request to answer with
    /// an apology bubble.
    #[error("Internal server error")]
    Internal {
        content: String,
        username: Option<String>,
        language: Language,
    },
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidJson | ChatError::MissingBody | ChatError::Invalid(_) => {
                StatusCode::BAD_REQUEST
            }
            ChatError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            ChatError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ChatError::NotFound => StatusCode::NOT_FOUND,
            ChatError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        match self {
            ChatError::Invalid(details) => {
                (status, Json(ErrorBody::new(error).with_details(details))).into_response()
            }
            ChatError::Throttled { remaining_seconds } => {
                (status, Json(ThrottledBody::new(remaining_seconds))).into_response()
            }
            ChatError::Internal {
                content,
                username,
                language,
            } => {
                let now = Local::now();
                let apology = unavailable_message(language);
                let body = FailureBody {
                    error: apology.to_string(),
                    user_message: Some(UserMessage::new(content, username.as_deref(), now)),
                    cz_message: Some(CompanionMessage::new(
                        apology,
                        AffectLabel::Idle,
                        None,
                        now,
                    )),
                    analytics: None,
                };
                (status, Json(body)).into_response()
            }
            _ => (status, Json(ErrorBody::new(error))).into_response(),
        }
    }
}
