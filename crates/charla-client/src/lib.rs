//! charla-client: Streaming HTTP client for the charla chat backend
//!
//! This crate covers the wire side of a chat turn: sending the request,
//! splitting the chunked response body into frames, and decoding frames
//! into typed events. What those events do to a conversation is the
//! session layer's business.

pub mod client;
pub mod decode;
pub mod error;
pub mod protocol;

pub use client::{ChatClient, ClientConfig, DEFAULT_TIMEOUT};
pub use decode::FrameDecoder;
pub use error::{Error, Result};
pub use protocol::{ChatEvent, ChatEventStream, ChatRequest, HealthStatus, parse_frame};
