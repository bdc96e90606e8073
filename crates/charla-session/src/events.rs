//! Session event types

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Events emitted while a session drives a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A user message was appended and the request went out
    TurnStarted { message: Message },

    /// The assistant message was allocated; reply text follows
    ReplyStarted { message: Message },

    /// One character was revealed into the open reply
    ReplyDelta { id: u64, delta: char },

    /// The backend reported a new token total
    UsageUpdated { total_tokens: u64 },

    /// The turn finished cleanly
    TurnEnded,

    /// The turn failed; the message is what the user sees
    TurnFailed { message: String },

    /// The conversation was reset
    Cleared,
}

impl SessionEvent {
    /// Check if this event ends a turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::TurnEnded | SessionEvent::TurnFailed { .. })
    }
}
