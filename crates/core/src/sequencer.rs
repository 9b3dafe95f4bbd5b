use crate::types::{ConversationEvent, SequenceId};
use std::collections::BTreeMap;

/// Hands out sequence ids for user-initiated sends, starting at zero.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: u64,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> SequenceId {
        let id = SequenceId::new(self.next);
        self.next += 1;
        id
    }
}

/// Events for one send, held until every earlier send has been delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub sequence_id: SequenceId,
    pub events: Vec<ConversationEvent>,
}

/// Reorders completed responses back into send order.
///
/// Completions may arrive in any order; [`OrderedDelivery::enqueue`] returns
/// the events that became deliverable, in order. An id that never completes
/// holds back every later id indefinitely.
#[derive(Debug, Default)]
pub struct OrderedDelivery {
    last_delivered: Option<SequenceId>,
    pending: BTreeMap<SequenceId, PendingEntry>,
}

impl OrderedDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the events for `sequence_id` and drains whatever is now in order.
    ///
    /// Ids that were already delivered or are already waiting are ignored.
    pub fn enqueue(
        &mut self,
        sequence_id: SequenceId,
        events: Vec<ConversationEvent>,
    ) -> Vec<ConversationEvent> {
        if self.is_delivered(sequence_id) || self.pending.contains_key(&sequence_id) {
            tracing::warn!("ignoring duplicate completion for {}", sequence_id);
            return Vec::new();
        }

        self.pending.insert(
            sequence_id,
            PendingEntry {
                sequence_id,
                events,
            },
        );
        self.drain()
    }

    /// Removes and returns the events of every consecutive id after the last
    /// delivered one, stopping at the first gap.
    pub fn drain(&mut self) -> Vec<ConversationEvent> {
        let mut ready = Vec::new();
        loop {
            let expected = self.next_expected();
            let Some(entry) = self.pending.remove(&expected) else {
                break;
            };
            tracing::debug!(
                "delivering {} ({} events)",
                entry.sequence_id,
                entry.events.len()
            );
            ready.extend(entry.events);
            self.last_delivered = Some(entry.sequence_id);
        }
        if !self.pending.is_empty() {
            tracing::debug!(
                "{} responses waiting on {}",
                self.pending.len(),
                self.next_expected()
            );
        }
        ready
    }

    pub fn last_delivered(&self) -> Option<SequenceId> {
        self.last_delivered
    }

    /// Number of completed sends still held back by a gap.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn next_expected(&self) -> SequenceId {
        self.last_delivered
            .map_or(SequenceId::FIRST, |delivered| delivered.next())
    }

    fn is_delivered(&self, sequence_id: SequenceId) -> bool {
        self.last_delivered
            .is_some_and(|delivered| sequence_id <= delivered)
    }
}
