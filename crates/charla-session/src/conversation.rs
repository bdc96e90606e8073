//! Conversation state and its transitions
//!
//! Pure state: no I/O, no timing. The session driver feeds decoded events
//! through these transitions; the UI reads the fields back out.

use crate::message::{Message, Sender};

/// Where the conversation is in the lifecycle of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No turn in flight
    #[default]
    Idle,
    /// Request sent, reply text not started yet
    Waiting,
    /// Reply text is arriving
    Streaming,
}

/// Transcript plus turn bookkeeping
#[derive(Debug, Default)]
pub struct Conversation {
    /// Transcript in arrival order
    pub messages: Vec<Message>,
    /// Current turn phase
    pub phase: Phase,
    /// User-facing error from the last failed turn, cleared on the next submit
    pub last_error: Option<String>,
    /// Token total as last reported by the backend
    pub total_tokens: u64,
    next_id: u64,
    open_reply: Option<u64>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a turn is in flight. Gates submission of the next message.
    pub fn is_streaming(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Whether the reply has not started yet. Drives the typing indicator,
    /// which disappears once the first characters arrive.
    pub fn is_typing(&self) -> bool {
        self.phase == Phase::Waiting
    }

    /// Id of the assistant message currently receiving text
    pub fn open_reply_id(&self) -> Option<u64> {
        self.open_reply
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Start a turn: append the user's message and clear the previous error
    pub fn begin_turn(&mut self, text: &str) -> Message {
        let message = Message::new(self.next_id(), Sender::User, text);
        self.messages.push(message.clone());
        self.last_error = None;
        self.phase = Phase::Waiting;
        message
    }

    /// First reply text is arriving: allocate the assistant message
    pub fn begin_reply(&mut self) -> Message {
        let message = Message::new(self.next_id(), Sender::Assistant, "");
        self.open_reply = Some(message.id);
        self.messages.push(message.clone());
        self.phase = Phase::Streaming;
        message
    }

    /// Append one revealed character to the open reply, returning its id.
    /// Does nothing when no reply is open.
    pub fn push_char(&mut self, c: char) -> Option<u64> {
        let id = self.open_reply?;
        let message = self.messages.iter_mut().rev().find(|m| m.id == id)?;
        message.text.push(c);
        Some(id)
    }

    /// Record the token total reported by the backend. The new value
    /// replaces the old one; totals are never summed here.
    pub fn set_total_tokens(&mut self, total_tokens: u64) {
        self.total_tokens = total_tokens;
    }

    /// Close the turn cleanly, keeping whatever text arrived
    pub fn finish_turn(&mut self) {
        self.open_reply = None;
        self.phase = Phase::Idle;
    }

    /// Close the turn with a user-facing error
    pub fn fail_turn(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.open_reply = None;
        self.phase = Phase::Idle;
    }

    /// Drop the transcript and return to a blank slate. Message ids keep
    /// counting up so ids stay unique across resets.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.phase = Phase::Idle;
        self.last_error = None;
        self.total_tokens = 0;
        self.open_reply = None;
    }
}
