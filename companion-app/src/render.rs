use companion_core::{AffectLabel, ConversationEvent};

const COMPANION_NAME: &str = "CZ";

pub fn event_line(event: &ConversationEvent) -> String {
    match event {
        ConversationEvent::UserEcho {
            content,
            display_name,
            timestamp,
        } => format!("[{timestamp}] {display_name}: {content}"),
        ConversationEvent::AssistantReply {
            text,
            affect,
            audio,
            timestamp,
        } => {
            let speaker = if audio.is_some() { " (speaking)" } else { "" };
            format!("[{timestamp}] {COMPANION_NAME} [{affect}]{speaker}: {text}")
        }
        ConversationEvent::AnalyticsResult(value) => format!("  analytics: {value}"),
        ConversationEvent::ErrorNotice { message } => format!("  ! {message}"),
    }
}

pub fn avatar_line(affect: AffectLabel) -> String {
    format!("  (avatar: {affect})")
}
