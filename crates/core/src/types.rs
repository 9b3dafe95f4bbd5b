use chrono::{DateTime, Local};
use std::fmt;

/// Monotonic identifier assigned by the client to every user-initiated send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceId(u64);

impl SequenceId {
    pub const FIRST: SequenceId = SequenceId(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Animation state tag attached to every companion reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectLabel {
    #[default]
    Idle,
    Analyzing,
    ThinkingDeep,
    Presenting,
    Approving,
    Concerned,
    GavelTap,
}

impl AffectLabel {
    pub const ALL: [AffectLabel; 7] = [
        AffectLabel::Idle,
        AffectLabel::Analyzing,
        AffectLabel::ThinkingDeep,
        AffectLabel::Presenting,
        AffectLabel::Approving,
        AffectLabel::Concerned,
        AffectLabel::GavelTap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AffectLabel::Idle => "idle",
            AffectLabel::Analyzing => "analyzing",
            AffectLabel::ThinkingDeep => "thinking_deep",
            AffectLabel::Presenting => "presenting",
            AffectLabel::Approving => "approving",
            AffectLabel::Concerned => "concerned",
            AffectLabel::GavelTap => "gavel_tap",
        }
    }
}

impl fmt::Display for AffectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply language requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "en" => Some(Language::En),
            "zh" => Some(Language::Zh),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synthesized speech clip, carried as base64 text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AudioClip(String);

impl AudioClip {
    pub fn new(base64: impl Into<String>) -> Self {
        Self(base64.into())
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn into_base64(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the chat consumer is told about.
///
/// `UserEcho` is emitted as soon as a message is sent. Every other variant is
/// attached to a [`SequenceId`] and reaches the consumer in send order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    UserEcho {
        content: String,
        display_name: String,
        timestamp: String,
    },
    AssistantReply {
        text: String,
        affect: AffectLabel,
        audio: Option<AudioClip>,
        timestamp: String,
    },
    AnalyticsResult(serde_json::Value),
    ErrorNotice {
        message: String,
    },
}

impl ConversationEvent {
    pub fn error_notice(message: impl Into<String>) -> Self {
        ConversationEvent::ErrorNotice {
            message: message.into(),
        }
    }

    /// Whether this event must go through the ordered buffer.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, ConversationEvent::UserEcho { .. })
    }
}

/// Formats a wall-clock time the way chat bubbles show it (`14:05`).
pub fn clock_label(at: DateTime<Local>) -> String {
    at.format("%H:%M").to_string()
}
