//! Transcript message types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Label used in transcripts and exports
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "AI",
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the session, assigned in increasing order
    pub id: u64,
    pub sender: Sender,
    /// Reply text grows one character at a time while it streams in
    pub text: String,
    /// Display only; ordering comes from position in the transcript
    pub timestamp: DateTime<Local>,
}

impl Message {
    pub(crate) fn new(id: u64, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            text: text.into(),
            timestamp: Local::now(),
        }
    }

    /// Clock label shown next to the sender, e.g. `14:05:31`
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}
