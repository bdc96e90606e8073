//! Transport abstraction between the session and the backend

use async_trait::async_trait;
use charla_client::{ChatClient, ChatEventStream, Result};

/// Source of reply event streams.
///
/// The session talks to the backend only through this seam, so tests can
/// substitute canned streams for the real HTTP client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one user message and open the reply event stream
    async fn open(&self, message: &str) -> Result<ChatEventStream>;
}

/// Transport backed by the real HTTP client
pub struct HttpTransport {
    client: ChatClient,
}

impl HttpTransport {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, message: &str) -> Result<ChatEventStream> {
        self.client.stream(message).await
    }
}
