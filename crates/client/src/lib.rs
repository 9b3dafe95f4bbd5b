//! Client side of the companion: posts messages to `/chat` and hands the
//! replies to the consumer in the order the messages were sent.

pub mod session;
pub mod transport;

pub use companion_core::wire::ChatRequest as OutgoingMessage;
pub use session::{ChatSession, outcome_events};
pub use transport::{ChatOutcome, ChatTransport, ErrorEnvelope, HttpTransport, TransportError};
