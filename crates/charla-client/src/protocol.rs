//! Wire protocol for the chat backend
//!
//! A turn is one `POST /chat` request answered with a chunked body of
//! newline-delimited frames. Each frame is a `data:` marker followed by a
//! JSON event object tagged by its `type` field.

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::error::Result;

/// Marker prefix on streamed event frames
pub const DATA_PREFIX: &str = "data:";

/// Request body for `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message text
    pub message: String,
    /// Caller-chosen id grouping messages into one conversation
    pub conversation_id: String,
}

/// One decoded event from the reply stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A chunk of reply text
    Content { content: String },
    /// Running token total for the conversation
    Usage { total_tokens: u64 },
    /// The reply finished cleanly
    Done,
    /// The backend failed mid-reply
    Error { content: Option<String> },
}

impl ChatEvent {
    /// Check if this event ends the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done | ChatEvent::Error { .. })
    }
}

/// Response body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

/// Stream of decoded reply events for one turn
pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>;

/// Parse one decoded frame into an event.
///
/// Strips the `data:` marker, repeatedly when a proxy has doubled it, then
/// decodes the JSON payload. Returns `Ok(None)` for frames that are empty
/// after stripping; they carry no event.
pub fn parse_frame(frame: &str) -> Result<Option<ChatEvent>> {
    let mut payload = frame.trim();
    while let Some(rest) = payload.strip_prefix(DATA_PREFIX) {
        payload = rest.trim_start();
    }
    if payload.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str(payload)?;
    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- parse_frame ---

    #[test]
    fn test_parse_content_frame() {
        let event = parse_frame(r#"data: {"type": "content", "content": "Hello"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ChatEvent::Content {
                content: "Hello".into()
            }
        );
    }

    #[test]
    fn test_parse_usage_frame() {
        let event = parse_frame(r#"data: {"type": "usage", "total_tokens": 42}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event, ChatEvent::Usage { total_tokens: 42 });
    }

    #[test]
    fn test_parse_done_frame() {
        let event = parse_frame(r#"data: {"type": "done"}"#).unwrap().unwrap();
        assert_eq!(event, ChatEvent::Done);
        assert!(event.is_terminal());
    }

    #[test]
    fn test_parse_error_frame_with_and_without_detail() {
        let event = parse_frame(r#"data: {"type": "error", "content": "overloaded"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ChatEvent::Error {
                content: Some("overloaded".into())
            }
        );
        assert!(event.is_terminal());

        let event = parse_frame(r#"data: {"type": "error"}"#).unwrap().unwrap();
        assert_eq!(event, ChatEvent::Error { content: None });
    }

    #[test]
    fn test_parse_without_marker() {
        // Bare JSON lines decode too; the marker is not load-bearing.
        let event = parse_frame(r#"{"type": "done"}"#).unwrap().unwrap();
        assert_eq!(event, ChatEvent::Done);
    }

    #[test]
    fn test_parse_doubled_marker() {
        let event = parse_frame(r#"data: data: {"type": "done"}"#).unwrap().unwrap();
        assert_eq!(event, ChatEvent::Done);
    }

    #[test]
    fn test_parse_marker_without_space() {
        let event = parse_frame(r#"data:{"type": "content", "content": "hi"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event, ChatEvent::Content { content: "hi".into() });
    }

    #[test]
    fn test_empty_payload_is_no_event() {
        assert!(parse_frame("data:").unwrap().is_none());
        assert!(parse_frame("data: ").unwrap().is_none());
        assert!(parse_frame("").unwrap().is_none());
    }

    #[test]
    fn test_undecodable_payload_is_an_error() {
        assert!(parse_frame("data: not json").is_err());
        assert!(parse_frame(r#"data: {"type": "galaxy"}"#).is_err());
        // Valid JSON but not an object with a type tag.
        assert!(parse_frame("data: 42").is_err());
    }

    #[test]
    fn test_content_preserves_whitespace_in_payload() {
        let event = parse_frame(r#"data: {"type": "content", "content": "  a b  "}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ChatEvent::Content {
                content: "  a b  ".into()
            }
        );
    }

    // --- serde shape ---

    #[test]
    fn test_request_serializes_expected_fields() {
        let request = ChatRequest {
            message: "hi".into(),
            conversation_id: "terminal-session".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"], "hi");
        assert_eq!(json["conversation_id"], "terminal-session");
    }

    #[test]
    fn test_health_status_tolerates_missing_service() {
        let health: HealthStatus = serde_json::from_str(r#"{"status": "healthy"}"#).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "");
    }
}
