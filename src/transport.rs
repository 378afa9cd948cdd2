//! Client side of the chat backend
//!
//! [`ChatTransport`] sends one user message plus the pinned context and
//! returns the complete reply. [`HttpTransport`] is the network version.

mod error;
#[cfg(test)]
pub mod testing;

pub use error::TransportError;

use crate::api::{ChatRequest, ChatResponse, SuggestedAction, UsageInfo};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A complete reply from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
    pub message_id: String,
    pub usage: Option<UsageInfo>,
    pub suggested_actions: Vec<SuggestedAction>,
}

impl From<ChatResponse> for ChatReply {
    fn from(resp: ChatResponse) -> Self {
        Self {
            reply: resp.assistant_message,
            session_id: resp.session_id,
            message_id: resp.message_id,
            usage: resp.usage,
            suggested_actions: resp.suggested_actions,
        }
    }
}

/// Requests a reply for one user message
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: &str, pinned_context: &[String])
        -> Result<ChatReply, TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send(
        &self,
        message: &str,
        pinned_context: &[String],
    ) -> Result<ChatReply, TransportError> {
        (**self).send(message, pinned_context).await
    }
}

/// JSON-over-HTTP transport to `{base}/api/chat`
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        message: &str,
        pinned_context: &[String],
    ) -> Result<ChatReply, TransportError> {
        let request = ChatRequest {
            message: message.to_string(),
            pinned_context: pinned_context.to_vec(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Chat backend returned an error");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| TransportError::MalformedBody(e.to_string()))?;

        tracing::debug!(message_id = %parsed.message_id, "Received reply");
        Ok(parsed.into())
    }
}
