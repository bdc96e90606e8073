//! Error types for charla-client

use std::time::Duration;

use thiserror::Error;

/// Result type alias using charla-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// No response headers arrived within the configured window
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A streamed frame carried a payload that does not decode into an event
    #[error("malformed event payload: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}

impl Error {
    /// Create a status error from a response code and body text
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if this error is a failure of the connection itself, as opposed
    /// to a frame that arrived intact but could not be understood
    pub fn is_transport(&self) -> bool {
        !matches!(self, Error::MalformedEvent(_))
    }
}
