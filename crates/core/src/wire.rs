//! JSON bodies exchanged over `POST /chat`.
//!
//! Field names are camelCase on the wire. The request is validated field by
//! field from an untyped [`Value`] so that every problem is reported back to
//! the caller at once instead of failing on the first serde error.

use crate::types::{AffectLabel, AudioClip, ConversationEvent, Language, clock_label};
use chrono::{DateTime, Local};
use serde_json::Value;

/// Upper bound on the length of a single chat message, in characters.
pub const MAX_CONTENT_CHARS: usize = 2000;
/// Display name used when the sender did not provide one.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

/// One reason a request body was rejected.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl ChatRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            username: None,
            language: Language::default(),
            wallet_address: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_wallet_address(mut self, wallet_address: impl Into<String>) -> Self {
        self.wallet_address = Some(wallet_address.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(DEFAULT_DISPLAY_NAME)
    }

    /// Validates an untyped request body, collecting every issue found.
    ///
    /// Optional fields treat `null` the same as absent.
    pub fn from_json(body: &Value) -> Result<Self, Vec<ValidationIssue>> {
        let Some(fields) = body.as_object() else {
            return Err(vec![ValidationIssue::new(
                "",
                format!("Expected object, received {}", type_name(body)),
            )]);
        };

        let mut issues = Vec::new();

        let content = match fields.get("content") {
            None | Some(Value::Null) => {
                issues.push(ValidationIssue::new("content", "Required"));
                None
            }
            Some(Value::String(text)) => {
                let chars = text.chars().count();
                if chars < 1 {
                    issues.push(ValidationIssue::new(
                        "content",
                        "String must contain at least 1 character(s)",
                    ));
                } else if chars > MAX_CONTENT_CHARS {
                    issues.push(ValidationIssue::new(
                        "content",
                        format!("String must contain at most {MAX_CONTENT_CHARS} character(s)"),
                    ));
                }
                Some(text.clone())
            }
            Some(other) => {
                issues.push(ValidationIssue::new(
                    "content",
                    format!("Expected string, received {}", type_name(other)),
                ));
                None
            }
        };

        let username = optional_string(fields.get("username"), "username", &mut issues);
        let wallet_address =
            optional_string(fields.get("walletAddress"), "walletAddress", &mut issues);

        let language = match fields.get("language") {
            None | Some(Value::Null) => Language::default(),
            Some(Value::String(tag)) => Language::parse(tag).unwrap_or_else(|| {
                issues.push(ValidationIssue::new(
                    "language",
                    format!("Invalid enum value. Expected 'en' | 'zh', received '{tag}'"),
                ));
                Language::default()
            }),
            Some(other) => {
                issues.push(ValidationIssue::new(
                    "language",
                    format!("Expected string, received {}", type_name(other)),
                ));
                Language::default()
            }
        };

        match content {
            Some(content) if issues.is_empty() => Ok(Self {
                content,
                username,
                language,
                wallet_address,
            }),
            _ => Err(issues),
        }
    }
}

fn optional_string(
    value: Option<&Value>,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            issues.push(ValidationIssue::new(
                path,
                format!("Expected string, received {}", type_name(other)),
            ));
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Cz,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserMessage {
    pub id: String,
    pub message: String,
    pub sender: Sender,
    pub username: String,
    pub timestamp: String,
}

impl UserMessage {
    pub fn new(message: impl Into<String>, username: Option<&str>, at: DateTime<Local>) -> Self {
        Self {
            id: at.timestamp_millis().to_string(),
            message: message.into(),
            sender: Sender::User,
            username: username.unwrap_or(DEFAULT_DISPLAY_NAME).to_string(),
            timestamp: clock_label(at),
        }
    }

    pub fn into_event(self) -> ConversationEvent {
        ConversationEvent::UserEcho {
            content: self.message,
            display_name: self.username,
            timestamp: self.timestamp,
        }
    }
}

/// The companion's side of an exchange.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionMessage {
    pub id: String,
    pub message: String,
    pub sender: Sender,
    pub timestamp: String,
    pub emotion: AffectLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<AudioClip>,
}

impl CompanionMessage {
    /// Builds the reply bubble. Its id sorts right after the user message
    /// created at the same instant.
    pub fn new(
        message: impl Into<String>,
        emotion: AffectLabel,
        audio: Option<AudioClip>,
        at: DateTime<Local>,
    ) -> Self {
        Self {
            id: (at.timestamp_millis() + 1).to_string(),
            message: message.into(),
            sender: Sender::Cz,
            timestamp: clock_label(at),
            emotion,
            audio_base64: audio,
        }
    }

    pub fn into_event(self) -> ConversationEvent {
        ConversationEvent::AssistantReply {
            text: self.message,
            affect: self.emotion,
            audio: self.audio_base64.filter(|clip| !clip.is_empty()),
            timestamp: self.timestamp,
        }
    }
}

/// Body of a successful `POST /chat`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub user_message: UserMessage,
    pub cz_message: CompanionMessage,
    #[serde(default)]
    pub analytics: Option<Value>,
}

impl ChatResponse {
    /// Ordered events for the consumer: the reply, then analytics if any.
    pub fn into_events(self) -> Vec<ConversationEvent> {
        let mut events = vec![self.cz_message.into_event()];
        if let Some(analytics) = self.analytics.filter(|value| !value.is_null()) {
            events.push(ConversationEvent::AnalyticsResult(analytics));
        }
        events
    }
}

/// Body of a 429 response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottledBody {
    pub error: String,
    pub remaining_time: u64,
}

impl ThrottledBody {
    pub fn new(remaining_seconds: u64) -> Self {
        Self {
            error: format!(
                "Please wait {remaining_seconds} seconds before sending another message."
            ),
            remaining_time: remaining_seconds,
        }
    }
}

/// Body of 400 and 405 responses.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationIssue>>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationIssue>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Body of a 500 response. The embedded message pair lets a UI render the
/// failure like any other exchange.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<UserMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cz_message: Option<CompanionMessage>,
    #[serde(default)]
    pub analytics: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_request_defaults_language_to_english() {
        let request = ChatRequest::from_json(&json!({ "content": "Hello" })).unwrap();
        assert_eq!(request, ChatRequest::new("Hello"));
        assert_eq!(request.display_name(), "Anonymous");
    }

    #[test]
    fn full_request_is_accepted() {
        let body = json!({
            "content": "I was accused of speeding",
            "username": "ana",
            "language": "zh",
            "walletAddress": "0xabc",
        });
        let request = ChatRequest::from_json(&body).unwrap();
        assert_eq!(request.language, Language::Zh);
        assert_eq!(request.username.as_deref(), Some("ana"));
        assert_eq!(request.wallet_address.as_deref(), Some("0xabc"));
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let body = json!({ "content": "", "language": "fr", "username": 7 });
        let issues = ChatRequest::from_json(&body).unwrap_err();
        let paths: Vec<&str> = issues.iter().map(|issue| issue.path.as_str()).collect();
        assert_eq!(paths, vec!["content", "username", "language"]);
    }

    #[test]
    fn content_length_is_counted_in_characters() {
        let at_limit = "法".repeat(MAX_CONTENT_CHARS);
        assert!(ChatRequest::from_json(&json!({ "content": at_limit })).is_ok());

        let over_limit = "a".repeat(MAX_CONTENT_CHARS + 1);
        let issues = ChatRequest::from_json(&json!({ "content": over_limit })).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("at most 2000"));
    }

    #[test]
    fn missing_content_and_non_object_bodies_are_rejected() {
        let issues = ChatRequest::from_json(&json!({ "language": "en" })).unwrap_err();
        assert_eq!(issues, vec![ValidationIssue::new("content", "Required")]);

        let issues = ChatRequest::from_json(&json!(["Hello"])).unwrap_err();
        assert_eq!(issues[0].message, "Expected object, received array");
    }

    #[test]
    fn response_serializes_with_camel_case_and_null_analytics() {
        let at = Local::now();
        let response = ChatResponse {
            user_message: UserMessage::new("Hello", None, at),
            cz_message: CompanionMessage::new("Hi there", AffectLabel::Idle, None, at),
            analytics: None,
        };
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["userMessage"]["sender"], "user");
        assert_eq!(value["userMessage"]["username"], "Anonymous");
        assert_eq!(value["czMessage"]["sender"], "cz");
        assert_eq!(value["czMessage"]["emotion"], "idle");
        assert!(value["czMessage"].get("audioBase64").is_none());
        assert!(value["analytics"].is_null());

        let user_id: i64 = value["userMessage"]["id"].as_str().unwrap().parse().unwrap();
        let cz_id: i64 = value["czMessage"]["id"].as_str().unwrap().parse().unwrap();
        assert_eq!(cz_id, user_id + 1);
    }

    #[test]
    fn response_events_put_analytics_after_the_reply() {
        let at = Local::now();
        let response = ChatResponse {
            user_message: UserMessage::new("Hello", None, at),
            cz_message: CompanionMessage::new(
                "Consider this",
                AffectLabel::ThinkingDeep,
                Some(AudioClip::new("AAAA")),
                at,
            ),
            analytics: Some(json!({ "riskLevel": "low" })),
        };

        let events = response.into_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ConversationEvent::AssistantReply { affect: AffectLabel::ThinkingDeep, audio: Some(_), .. }
        ));
        assert_eq!(
            events[1],
            ConversationEvent::AnalyticsResult(json!({ "riskLevel": "low" }))
        );
    }

    #[test]
    fn throttled_body_names_the_wait() {
        let body = serde_json::to_value(ThrottledBody::new(3)).unwrap();
        assert_eq!(
            body,
            json!({
                "error": "Please wait 3 seconds before sending another message.",
                "remainingTime": 3
            })
        );
    }
}
