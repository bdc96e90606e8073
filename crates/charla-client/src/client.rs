//! HTTP client for the chat backend

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;

use crate::decode::FrameDecoder;
use crate::error::{Error, Result};
use crate::protocol::{ChatEventStream, ChatRequest, HealthStatus, parse_frame};

/// Default window for connecting and receiving response headers
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings, resolved by the caller and injected up front
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    /// Conversation id sent with every message
    pub conversation_id: String,
    /// Covers connecting and receiving response headers. A reply may
    /// stream for longer than this without being cut off.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            conversation_id: "terminal-session".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for one chat backend
pub struct ChatClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send one user message and open the reply event stream.
    ///
    /// The returned stream yields decoded events in arrival order and ends
    /// only when the response body does. Frames that fail to decode come
    /// through as `Err` items; deciding whether to keep reading after one
    /// is the caller's call.
    pub async fn stream(&self, message: &str) -> Result<ChatEventStream> {
        let request = ChatRequest {
            message: message.to_string(),
            conversation_id: self.config.conversation_id.clone(),
        };

        let send = self.client.post(self.endpoint("/chat")).json(&request).send();
        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| Error::Timeout(self.config.timeout))??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status, body));
        }

        let mut bytes = response.bytes_stream();

        Ok(Box::pin(stream! {
            let mut decoder = FrameDecoder::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(Error::Http(e));
                        return;
                    }
                };
                for frame in decoder.feed(&chunk) {
                    match parse_frame(&frame) {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => {}
                        Err(e) => yield Err(e),
                    }
                }
            }

            // The body can end without a final newline; drain the tail.
            if let Some(frame) = decoder.finish() {
                match parse_frame(&frame) {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                }
            }
        }))
    }

    /// Probe the backend health endpoint
    pub async fn health(&self) -> Result<HealthStatus> {
        let send = self.client.get(self.endpoint("/health")).send();
        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| Error::Timeout(self.config.timeout))??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status, body));
        }

        Ok(response.json().await?)
    }
}
