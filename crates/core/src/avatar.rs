use crate::playback::PlaybackNotice;
use crate::types::{AffectLabel, ConversationEvent};

/// The animation state a UI shows for the companion.
///
/// Each update returns `true` when the visible state changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AvatarState {
    current: AffectLabel,
}

impl AvatarState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> AffectLabel {
        self.current
    }

    /// The user sent a new message.
    pub fn on_send(&mut self) -> bool {
        self.set(AffectLabel::Idle)
    }

    pub fn on_event(&mut self, event: &ConversationEvent) -> bool {
        match event {
            ConversationEvent::AssistantReply { affect, .. } => self.set(*affect),
            _ => false,
        }
    }

    pub fn on_playback(&mut self, notice: &PlaybackNotice) -> bool {
        match notice {
            PlaybackNotice::Ended => self.set(AffectLabel::Idle),
            PlaybackNotice::Started => false,
        }
    }

    fn set(&mut self, next: AffectLabel) -> bool {
        let changed = self.current != next;
        self.current = next;
        changed
    }
}
