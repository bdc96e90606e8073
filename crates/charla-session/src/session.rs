//! Session driver: applies reply events to the conversation
//!
//! One session owns one [`Conversation`] and drives it turn by turn.
//! [`Session::submit`] runs a whole turn inline: it opens the transport
//! stream, reveals reply text through the typewriter pacing, and walks the
//! conversation through its transitions, broadcasting a [`SessionEvent`]
//! for every change so UIs can mirror the state.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use charla_client::ChatEvent;

use crate::conversation::Conversation;
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::handle::SessionHandle;
use crate::message::Message;
use crate::transport::Transport;
use crate::typewriter::{DEFAULT_CHAR_DELAY, paced_chars};

/// User-facing message for any failure of the connection itself
pub const CONNECTION_ERROR: &str = "Failed to connect to server.";

/// User-facing message for a backend error event without detail
const UNKNOWN_BACKEND_ERROR: &str = "Unknown backend error";

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause after each revealed reply character; zero disables pacing
    pub char_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            char_delay: DEFAULT_CHAR_DELAY,
        }
    }
}

/// Drives one conversation against one backend
pub struct Session {
    config: SessionConfig,
    conversation: Conversation,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<SessionEvent>,
    handle: SessionHandle,
}

impl Session {
    /// Create a new session
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            conversation: Conversation::new(),
            transport,
            event_tx,
            handle: SessionHandle::new(),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Current conversation state
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Transcript in arrival order
    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    /// Get a cloneable handle for poking the session from external code.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Abort the in-flight turn, keeping text already revealed
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Drop the transcript and retire any in-flight turn. Safe to call at
    /// any point, including mid-stream.
    pub fn reset(&mut self) {
        self.handle.invalidate();
        self.conversation.reset();
        let _ = self.event_tx.send(SessionEvent::Cleared);
    }

    /// Send one user message and drive the reply to completion.
    ///
    /// Returns when the turn reaches a terminal state: a `done` or `error`
    /// event, end of data, an abort, or a connection failure. Events still
    /// in flight from a turn retired by [`reset`](Session::reset) or a newer
    /// submit are discarded instead of being applied.
    pub async fn submit(&mut self, text: &str) -> Result<()> {
        // Retire whatever might still be in flight, then arm a fresh token
        // for this turn.
        let generation = self.handle.invalidate();
        *self.handle.cancel.lock() = CancellationToken::new();
        let cancel = self.handle.cancel.lock().clone();

        let user_message = self.conversation.begin_turn(text);
        let _ = self.event_tx.send(SessionEvent::TurnStarted {
            message: user_message,
        });

        let mut events = match self.transport.open(text).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("failed to open reply stream: {e}");
                if self.handle.generation() == generation {
                    self.fail(CONNECTION_ERROR);
                }
                return Err(e.into());
            }
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if self.handle.generation() != generation {
                        return Ok(());
                    }
                    self.conversation.finish_turn();
                    let _ = self.event_tx.send(SessionEvent::TurnEnded);
                    return Ok(());
                }
                event = events.next() => event,
            };

            let Some(event) = event else {
                // End of data without a terminal frame. The reply is as
                // complete as it will get; close the turn cleanly.
                break;
            };

            if self.handle.generation() != generation {
                return Ok(());
            }

            match event {
                Ok(ChatEvent::Content { content }) => {
                    if content.is_empty() {
                        continue;
                    }
                    if self.conversation.open_reply_id().is_none() {
                        let reply = self.conversation.begin_reply();
                        let _ = self
                            .event_tx
                            .send(SessionEvent::ReplyStarted { message: reply });
                    }
                    let mut chars = std::pin::pin!(paced_chars(content, self.config.char_delay));
                    while let Some(c) = chars.next().await {
                        if self.handle.generation() != generation {
                            return Ok(());
                        }
                        if cancel.is_cancelled() {
                            self.conversation.finish_turn();
                            let _ = self.event_tx.send(SessionEvent::TurnEnded);
                            return Ok(());
                        }
                        if let Some(id) = self.conversation.push_char(c) {
                            let _ = self.event_tx.send(SessionEvent::ReplyDelta { id, delta: c });
                        }
                    }
                }
                Ok(ChatEvent::Usage { total_tokens }) => {
                    self.conversation.set_total_tokens(total_tokens);
                    let _ = self
                        .event_tx
                        .send(SessionEvent::UsageUpdated { total_tokens });
                }
                Ok(ChatEvent::Done) => {
                    self.conversation.finish_turn();
                    let _ = self.event_tx.send(SessionEvent::TurnEnded);
                    return Ok(());
                }
                Ok(ChatEvent::Error { content }) => {
                    let message = content.unwrap_or_else(|| UNKNOWN_BACKEND_ERROR.to_string());
                    self.fail(&message);
                    return Err(Error::Turn(message));
                }
                Err(e) => {
                    if e.is_transport() {
                        tracing::warn!("reply stream broke mid-turn: {e}");
                    } else {
                        tracing::warn!("aborting turn on malformed frame: {e}");
                    }
                    self.fail(CONNECTION_ERROR);
                    return Err(e.into());
                }
            }
        }

        self.conversation.finish_turn();
        let _ = self.event_tx.send(SessionEvent::TurnEnded);
        Ok(())
    }

    fn fail(&mut self, message: &str) {
        self.conversation.fail_turn(message);
        let _ = self.event_tx.send(SessionEvent::TurnFailed {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;
    use async_trait::async_trait;
    use charla_client::{ChatEventStream, parse_frame};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    enum Item {
        Event(ChatEvent),
        Malformed,
        Broken,
    }

    fn content(text: &str) -> Item {
        Item::Event(ChatEvent::Content {
            content: text.to_string(),
        })
    }

    /// A mock transport serving one canned item script per turn.
    struct MockTransport {
        scripts: Mutex<VecDeque<Vec<Item>>>,
    }

    impl MockTransport {
        fn new(scripts: Vec<Vec<Item>>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self, _message: &str) -> charla_client::Result<ChatEventStream> {
            let items = self.scripts.lock().pop_front().unwrap_or_default();
            Ok(Box::pin(async_stream::stream! {
                for item in items {
                    match item {
                        Item::Event(event) => yield Ok(event),
                        Item::Malformed => yield Err(parse_frame("data: not json").unwrap_err()),
                        Item::Broken => {
                            yield Err(charla_client::Error::Timeout(Duration::from_secs(30)))
                        }
                    }
                }
            }))
        }
    }

    /// A transport whose open call itself fails.
    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn open(&self, _message: &str) -> charla_client::Result<ChatEventStream> {
            Err(charla_client::Error::status(500, "Internal Server Error"))
        }
    }

    /// Retires the turn via its handle after the first content chunk.
    #[derive(Default)]
    struct RetiringTransport {
        handle: Mutex<Option<SessionHandle>>,
    }

    #[async_trait]
    impl Transport for RetiringTransport {
        async fn open(&self, _message: &str) -> charla_client::Result<ChatEventStream> {
            let handle = self.handle.lock().take();
            Ok(Box::pin(async_stream::stream! {
                yield Ok(ChatEvent::Content { content: "He".into() });
                if let Some(handle) = &handle {
                    handle.invalidate();
                }
                yield Ok(ChatEvent::Content { content: "llo".into() });
                yield Ok(ChatEvent::Done);
            }))
        }
    }

    /// Aborts the turn via its handle after the first content chunk.
    #[derive(Default)]
    struct AbortingTransport {
        handle: Mutex<Option<SessionHandle>>,
    }

    #[async_trait]
    impl Transport for AbortingTransport {
        async fn open(&self, _message: &str) -> charla_client::Result<ChatEventStream> {
            let handle = self.handle.lock().take();
            Ok(Box::pin(async_stream::stream! {
                yield Ok(ChatEvent::Content { content: "Hi".into() });
                if let Some(handle) = &handle {
                    handle.abort();
                }
                yield Ok(ChatEvent::Content { content: " there".into() });
                yield Ok(ChatEvent::Done);
            }))
        }
    }

    fn make_session(scripts: Vec<Vec<Item>>) -> Session {
        let config = SessionConfig {
            char_delay: Duration::ZERO,
        };
        Session::new(config, Arc::new(MockTransport::new(scripts)))
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn revealed_text(events: &[SessionEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::ReplyDelta { delta, .. } => Some(*delta),
                _ => None,
            })
            .collect()
    }

    // --- happy path ---

    #[tokio::test]
    async fn test_turn_builds_reply_across_chunks() {
        let mut session = make_session(vec![vec![
            content("He"),
            content("llo"),
            Item::Event(ChatEvent::Done),
        ]]);

        session.submit("hi").await.unwrap();

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "hi");
        assert_eq!(messages[1].sender, Sender::Assistant);
        assert_eq!(messages[1].text, "Hello");
        assert!(!session.conversation().is_streaming());
        assert!(session.conversation().last_error.is_none());
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let mut session = make_session(vec![vec![
            content("He"),
            content("llo"),
            Item::Event(ChatEvent::Done),
        ]]);
        let mut rx = session.subscribe();

        session.submit("hi").await.unwrap();

        let events = drain(&mut rx);
        assert!(matches!(events[0], SessionEvent::TurnStarted { .. }));
        assert!(matches!(events[1], SessionEvent::ReplyStarted { .. }));
        assert_eq!(revealed_text(&events), "Hello");
        assert!(matches!(events.last(), Some(SessionEvent::TurnEnded)));
    }

    #[tokio::test]
    async fn test_single_reply_message_per_turn() {
        let mut session = make_session(vec![vec![
            content("a"),
            content("b"),
            content("c"),
            Item::Event(ChatEvent::Done),
        ]]);
        let mut rx = session.subscribe();

        session.submit("hi").await.unwrap();

        let events = drain(&mut rx);
        let reply_starts = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::ReplyStarted { .. }))
            .count();
        assert_eq!(reply_starts, 1);
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_usage_total_is_replaced_not_summed() {
        let mut session = make_session(vec![vec![
            Item::Event(ChatEvent::Usage { total_tokens: 100 }),
            content("x"),
            Item::Event(ChatEvent::Usage { total_tokens: 40 }),
            Item::Event(ChatEvent::Done),
        ]]);

        session.submit("hi").await.unwrap();
        assert_eq!(session.conversation().total_tokens, 40);
    }

    #[tokio::test]
    async fn test_empty_content_frames_are_skipped() {
        let mut session = make_session(vec![vec![content(""), Item::Event(ChatEvent::Done)]]);

        session.submit("hi").await.unwrap();
        // No assistant message gets allocated for empty chunks.
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_eof_without_terminal_closes_cleanly() {
        let mut session = make_session(vec![vec![content("Hi")]]);

        session.submit("hi").await.unwrap();
        assert_eq!(session.messages()[1].text, "Hi");
        assert!(!session.conversation().is_streaming());
        assert!(session.conversation().last_error.is_none());
    }

    // --- terminal strictness ---

    #[tokio::test]
    async fn test_frames_after_done_are_not_observed() {
        let mut session = make_session(vec![vec![
            content("Hi"),
            Item::Event(ChatEvent::Done),
            content("!!!"),
            Item::Event(ChatEvent::Error {
                content: Some("late".into()),
            }),
        ]]);

        session.submit("hi").await.unwrap();
        assert_eq!(session.messages()[1].text, "Hi");
        assert!(session.conversation().last_error.is_none());
    }

    #[tokio::test]
    async fn test_frames_after_error_are_not_observed() {
        let mut session = make_session(vec![vec![
            Item::Event(ChatEvent::Error {
                content: Some("boom".into()),
            }),
            content("ghost"),
        ]]);

        let result = session.submit("hi").await;
        assert!(result.is_err());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.conversation().last_error.as_deref(), Some("boom"));
    }

    // --- failures ---

    #[tokio::test]
    async fn test_backend_error_event_fails_turn() {
        let mut session = make_session(vec![vec![Item::Event(ChatEvent::Error {
            content: Some("overloaded".into()),
        })]]);
        let mut rx = session.subscribe();

        let result = session.submit("hi").await;
        assert!(matches!(result, Err(Error::Turn(_))));
        assert_eq!(
            session.conversation().last_error.as_deref(),
            Some("overloaded")
        );
        assert!(!session.conversation().is_streaming());

        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::TurnFailed { message }) if message == "overloaded"
        ));
    }

    #[tokio::test]
    async fn test_backend_error_without_detail_uses_default() {
        let mut session =
            make_session(vec![vec![Item::Event(ChatEvent::Error { content: None })]]);

        let _ = session.submit("hi").await;
        assert_eq!(
            session.conversation().last_error.as_deref(),
            Some("Unknown backend error")
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_aborts_turn_with_generic_error() {
        let mut session = make_session(vec![vec![Item::Malformed, content("ghost")]]);

        let result = session.submit("hi").await;
        assert!(matches!(result, Err(Error::Client(_))));
        assert_eq!(
            session.conversation().last_error.as_deref(),
            Some(CONNECTION_ERROR)
        );
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_after_content_keeps_partial_text() {
        let mut session = make_session(vec![vec![content("Par"), Item::Malformed]]);

        let _ = session.submit("hi").await;
        assert_eq!(session.messages()[1].text, "Par");
        assert_eq!(
            session.conversation().last_error.as_deref(),
            Some(CONNECTION_ERROR)
        );
    }

    #[tokio::test]
    async fn test_stream_break_maps_to_generic_error() {
        let mut session = make_session(vec![vec![content("Hi"), Item::Broken]]);

        let result = session.submit("hi").await;
        assert!(matches!(result, Err(Error::Client(_))));
        assert_eq!(session.messages()[1].text, "Hi");
        assert_eq!(
            session.conversation().last_error.as_deref(),
            Some(CONNECTION_ERROR)
        );
    }

    #[tokio::test]
    async fn test_open_failure_maps_to_generic_error() {
        let config = SessionConfig {
            char_delay: Duration::ZERO,
        };
        let mut session = Session::new(config, Arc::new(FailingTransport));

        let result = session.submit("hi").await;
        assert!(matches!(result, Err(Error::Client(_))));
        assert_eq!(
            session.conversation().last_error.as_deref(),
            Some(CONNECTION_ERROR)
        );
        assert!(!session.conversation().is_streaming());
    }

    #[tokio::test]
    async fn test_submit_clears_error_from_previous_turn() {
        let mut session = make_session(vec![
            vec![Item::Event(ChatEvent::Error {
                content: Some("boom".into()),
            })],
            vec![content("ok"), Item::Event(ChatEvent::Done)],
        ]);

        let _ = session.submit("one").await;
        assert!(session.conversation().last_error.is_some());

        session.submit("two").await.unwrap();
        assert!(session.conversation().last_error.is_none());
        assert_eq!(session.messages().len(), 3);
    }

    // --- reset ---

    #[tokio::test]
    async fn test_reset_clears_state_and_emits_cleared() {
        let mut session = make_session(vec![vec![
            content("Hello"),
            Item::Event(ChatEvent::Usage { total_tokens: 7 }),
            Item::Event(ChatEvent::Done),
        ]]);
        let mut rx = session.subscribe();

        session.submit("hi").await.unwrap();
        session.reset();

        assert!(session.messages().is_empty());
        assert_eq!(session.conversation().total_tokens, 0);
        assert!(session.conversation().last_error.is_none());
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(SessionEvent::Cleared)));
    }

    // --- retirement and abort ---

    #[tokio::test]
    async fn test_retired_turn_stops_applying_events() {
        let transport = Arc::new(RetiringTransport::default());
        let config = SessionConfig {
            char_delay: Duration::ZERO,
        };
        let mut session = Session::new(config, transport.clone());
        *transport.handle.lock() = Some(session.handle());

        session.submit("hi").await.unwrap();

        // The chunk revealed before retirement stays; everything after is
        // discarded, including the done event.
        assert_eq!(session.messages()[1].text, "He");

        session.reset();
        assert!(session.messages().is_empty());
        assert!(!session.conversation().is_streaming());
    }

    #[tokio::test]
    async fn test_abort_keeps_partial_text_without_error() {
        let transport = Arc::new(AbortingTransport::default());
        let config = SessionConfig {
            char_delay: Duration::ZERO,
        };
        let mut session = Session::new(config, transport.clone());
        *transport.handle.lock() = Some(session.handle());

        session.submit("hi").await.unwrap();

        assert_eq!(session.messages()[1].text, "Hi");
        assert!(session.conversation().last_error.is_none());
        assert!(!session.conversation().is_streaming());
    }
}
