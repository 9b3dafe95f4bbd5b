use crate::transport::{ChatOutcome, ChatTransport, TransportError};
use chrono::Local;
use companion_core::sequencer::{OrderedDelivery, SequenceAllocator};
use companion_core::wire::{ChatRequest, UserMessage};
use companion_core::{ConversationEvent, SequenceId};
use std::sync::Arc;
use tokio::sync::mpsc;

const THROTTLED_FALLBACK: &str = "Please wait before sending another message.";
const FAILED_FALLBACK: &str = "Failed to send message";

type Completion = (SequenceId, Vec<ConversationEvent>);

/// Turns the result of one request into the events it contributes to the
/// ordered stream.
pub fn outcome_events(result: Result<ChatOutcome, TransportError>) -> Vec<ConversationEvent> {
    match result {
        Ok(ChatOutcome::Replied(response)) => response.into_events(),
        Ok(ChatOutcome::Throttled(envelope)) => vec![ConversationEvent::error_notice(
            envelope
                .error
                .unwrap_or_else(|| THROTTLED_FALLBACK.to_string()),
        )],
        Ok(ChatOutcome::Failed { status, envelope }) => match envelope.cz_message {
            // the server already wrapped its failure in an apology bubble
            Some(reply) if status == 500 => vec![reply.into_event()],
            _ => vec![ConversationEvent::error_notice(
                envelope.error.unwrap_or_else(|| FAILED_FALLBACK.to_string()),
            )],
        },
        Err(e) => {
            tracing::warn!("chat request failed: {}", e);
            vec![ConversationEvent::error_notice(e.to_string())]
        }
    }
}

/// Sends chat messages and reports the conversation as one event stream.
///
/// `UserEcho` events are emitted from [`ChatSession::send`] itself. Everything
/// else goes through a delivery task that owns the reorder buffer, so replies
/// come out in send order however the requests complete. In-flight requests
/// are never cancelled; dropping the session only stops new sends.
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    allocator: SequenceAllocator,
    events: mpsc::UnboundedSender<ConversationEvent>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl ChatSession {
    /// Starts the delivery task. Must be called inside a tokio runtime.
    pub fn start(
        transport: Arc<dyn ChatTransport>,
    ) -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        tokio::spawn(deliver_in_order(completions_rx, events_tx.clone()));

        (
            Self {
                transport,
                allocator: SequenceAllocator::new(),
                events: events_tx,
                completions: completions_tx,
            },
            events_rx,
        )
    }

    pub fn send(&mut self, message: ChatRequest) -> SequenceId {
        let id = self.allocator.allocate();

        let echo = UserMessage::new(
            message.content.clone(),
            Some(message.display_name()),
            Local::now(),
        );
        if self.events.send(echo.into_event()).is_err() {
            tracing::debug!("event receiver dropped, echo for {} discarded", id);
        }

        let transport = self.transport.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            // a panicking transport still has to fill its slot in the order
            let request = tokio::spawn(async move { transport.post_chat(message).await });
            let events = match request.await {
                Ok(result) => outcome_events(result),
                Err(e) => {
                    tracing::error!("chat request {} aborted: {}", id, e);
                    vec![ConversationEvent::error_notice(FAILED_FALLBACK)]
                }
            };
            if completions.send((id, events)).is_err() {
                tracing::debug!("delivery task gone, dropping result for {}", id);
            }
        });

        id
    }
}

async fn deliver_in_order(
    mut completions: mpsc::UnboundedReceiver<Completion>,
    events: mpsc::UnboundedSender<ConversationEvent>,
) {
    let mut delivery = OrderedDelivery::new();
    while let Some((id, ready)) = completions.recv().await {
        for event in delivery.enqueue(id, ready) {
            if events.send(event).is_err() {
                return;
            }
        }
    }
    if delivery.pending_len() > 0 {
        tracing::warn!(
            "session closed with {} responses never delivered",
            delivery.pending_len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ErrorEnvelope, MockChatTransport};
    use async_trait::async_trait;
    use companion_core::AffectLabel;
    use companion_core::wire::{ChatResponse, CompanionMessage};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn reply_to(content: &str) -> ChatOutcome {
        let now = Local::now();
        ChatOutcome::Replied(ChatResponse {
            user_message: UserMessage::new(content, None, now),
            cz_message: CompanionMessage::new(
                format!("re: {content}"),
                AffectLabel::Presenting,
                None,
                now,
            ),
            analytics: None,
        })
    }

    fn reply_text(event: &ConversationEvent) -> &str {
        match event {
            ConversationEvent::AssistantReply { text, .. } => text,
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    /// Holds every request until the test releases it.
    #[derive(Default)]
    struct GatedTransport {
        gates: Mutex<HashMap<String, oneshot::Receiver<ChatOutcome>>>,
    }

    impl GatedTransport {
        fn gate(&self, content: &str) -> oneshot::Sender<ChatOutcome> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(content.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl ChatTransport for GatedTransport {
        async fn post_chat(&self, request: ChatRequest) -> Result<ChatOutcome, TransportError> {
            let gate = self.gates.lock().unwrap().remove(&request.content);
            Ok(gate.unwrap().await.unwrap())
        }
    }

    async fn next(events: &mut mpsc::UnboundedReceiver<ConversationEvent>) -> ConversationEvent {
        tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream closed")
    }

    async fn assert_quiet(events: &mut mpsc::UnboundedReceiver<ConversationEvent>) {
        let result = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
        assert!(result.is_err(), "unexpected event: {result:?}");
    }

    #[tokio::test]
    async fn replies_arrive_in_send_order_despite_reverse_completion() {
        let transport = Arc::new(GatedTransport::default());
        let gates: Vec<_> = ["a", "b", "c"].iter().map(|c| transport.gate(c)).collect();
        let (mut session, mut events) = ChatSession::start(transport.clone());

        for content in ["a", "b", "c"] {
            session.send(ChatRequest::new(content));
            match next(&mut events).await {
                ConversationEvent::UserEcho {
                    content: echoed,
                    display_name,
                    ..
                } => {
                    assert_eq!(echoed, content);
                    assert_eq!(display_name, "Anonymous");
                }
                other => panic!("expected an echo, got {other:?}"),
            }
        }

        let mut gates = gates.into_iter().rev();
        let (c, b, a) = (gates.next().unwrap(), gates.next().unwrap(), gates.next().unwrap());

        c.send(reply_to("c")).unwrap();
        b.send(reply_to("b")).unwrap();
        assert_quiet(&mut events).await;

        a.send(reply_to("a")).unwrap();
        assert_eq!(reply_text(&next(&mut events).await), "re: a");
        assert_eq!(reply_text(&next(&mut events).await), "re: b");
        assert_eq!(reply_text(&next(&mut events).await), "re: c");
        assert_quiet(&mut events).await;
    }

    #[tokio::test]
    async fn errors_hold_their_place_in_line() {
        let transport = Arc::new(GatedTransport::default());
        let first = transport.gate("first");
        let second = transport.gate("second");
        let (mut session, mut events) = ChatSession::start(transport.clone());

        assert_eq!(session.send(ChatRequest::new("first")), SequenceId::new(0));
        assert_eq!(session.send(ChatRequest::new("second")), SequenceId::new(1));
        next(&mut events).await;
        next(&mut events).await;

        second.send(reply_to("second")).unwrap();
        first
            .send(ChatOutcome::Throttled(ErrorEnvelope {
                error: Some("Please wait 4 seconds before sending another message.".into()),
                remaining_time: Some(4),
                cz_message: None,
            }))
            .unwrap();

        assert_eq!(
            next(&mut events).await,
            ConversationEvent::error_notice("Please wait 4 seconds before sending another message.")
        );
        assert_eq!(reply_text(&next(&mut events).await), "re: second");
    }

    #[tokio::test]
    async fn transport_failure_becomes_an_error_notice() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_post_chat()
            .times(1)
            .returning(|_| Err(TransportError::NotJson { status: 502 }));

        let (mut session, mut events) = ChatSession::start(Arc::new(transport));
        session.send(ChatRequest::new("hello").with_username("Dana"));

        match next(&mut events).await {
            ConversationEvent::UserEcho { display_name, .. } => assert_eq!(display_name, "Dana"),
            other => panic!("expected an echo, got {other:?}"),
        }
        assert_eq!(
            next(&mut events).await,
            ConversationEvent::error_notice("Server returned non-JSON response (status 502)")
        );
    }

    /// Panics on the message "boom" and answers everything else.
    struct CrashingTransport;

    #[async_trait]
    impl ChatTransport for CrashingTransport {
        async fn post_chat(&self, request: ChatRequest) -> Result<ChatOutcome, TransportError> {
            if request.content == "boom" {
                panic!("transport crashed");
            }
            Ok(reply_to(&request.content))
        }
    }

    #[tokio::test]
    async fn crashed_request_reports_an_error_and_later_replies_still_arrive() {
        let (mut session, mut events) = ChatSession::start(Arc::new(CrashingTransport));
        session.send(ChatRequest::new("boom"));
        session.send(ChatRequest::new("after"));

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(next(&mut events).await);
        }
        let rest: Vec<_> = received
            .into_iter()
            .filter(|event| !matches!(event, ConversationEvent::UserEcho { .. }))
            .collect();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0], ConversationEvent::error_notice(FAILED_FALLBACK));
        assert_eq!(reply_text(&rest[1]), "re: after");
    }

    #[test]
    fn server_apology_is_shown_as_a_reply() {
        let apology = CompanionMessage::new("Sorry.", AffectLabel::Idle, None, Local::now());
        let events = outcome_events(Ok(ChatOutcome::Failed {
            status: 500,
            envelope: ErrorEnvelope {
                error: Some("Internal server error".into()),
                remaining_time: None,
                cz_message: Some(apology),
            },
        }));
        assert_eq!(events.len(), 1);
        assert_eq!(reply_text(&events[0]), "Sorry.");
    }

    #[test]
    fn missing_error_text_uses_fallbacks() {
        assert_eq!(
            outcome_events(Ok(ChatOutcome::Throttled(ErrorEnvelope::default()))),
            vec![ConversationEvent::error_notice(THROTTLED_FALLBACK)]
        );
        assert_eq!(
            outcome_events(Ok(ChatOutcome::Failed {
                status: 400,
                envelope: ErrorEnvelope::default(),
            })),
            vec![ConversationEvent::error_notice(FAILED_FALLBACK)]
        );
        assert_eq!(
            outcome_events(Ok(ChatOutcome::Failed {
                status: 400,
                envelope: ErrorEnvelope {
                    error: Some("Invalid request data".into()),
                    ..Default::default()
                },
            })),
            vec![ConversationEvent::error_notice("Invalid request data")]
        );
    }

    #[test]
    fn analytics_follow_the_reply() {
        let ChatOutcome::Replied(mut response) = reply_to("x") else {
            unreachable!()
        };
        response.analytics = Some(serde_json::json!({ "score": 3 }));

        let events = outcome_events(Ok(ChatOutcome::Replied(response)));
        assert_eq!(reply_text(&events[0]), "re: x");
        assert_eq!(
            events[1],
            ConversationEvent::AnalyticsResult(serde_json::json!({ "score": 3 }))
        );
    }
}
