//! Error types for charla-session

use thiserror::Error;

/// Result type alias using charla-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a turn
#[derive(Error, Debug)]
pub enum Error {
    /// The backend client failed
    #[error(transparent)]
    Client(#[from] charla_client::Error),

    /// The backend reported a failure event; the string is what the user sees
    #[error("{0}")]
    Turn(String),
}
