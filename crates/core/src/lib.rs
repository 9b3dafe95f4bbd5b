//! Core logic for the judge companion: everything that has to hold an
//! invariant under concurrency lives here, independent of any UI or HTTP
//! framework.
//!
//! * [`sequencer`] restores send order for responses that complete out of order.
//! * [`throttle`] admits or rejects requests per session with a fixed cooldown.
//! * [`playback`] plays synthesized clips one at a time, in push order.
//! * [`responder`] runs the provider fallback chain and classifies the reply.

pub mod affect;
pub mod avatar;
pub mod playback;
pub mod responder;
pub mod sequencer;
pub mod throttle;
pub mod types;
pub mod wire;

pub use types::{AffectLabel, AudioClip, ConversationEvent, Language, SequenceId};
