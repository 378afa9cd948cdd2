//! Mock transport for tests

use super::{ChatReply, ChatTransport, TransportError};
use crate::api::SuggestedAction;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

/// Transport returning queued replies, recording every request
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<ChatReply, TransportError>>>,
    requests: Mutex<Vec<(String, Vec<String>)>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    entered: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }

    pub fn queue_reply(&self, text: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply(text)));
    }

    pub fn queue_error(&self, error: TransportError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Hold the next `send` until the returned sender fires or is dropped
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Wait until a `send` call has started
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn recorded_requests(&self) -> Vec<(String, Vec<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn reply(text: impl Into<String>) -> ChatReply {
    ChatReply {
        reply: text.into(),
        session_id: "mock-session".to_string(),
        message_id: "mock-message".to_string(),
        usage: None,
        suggested_actions: SuggestedAction::ALL.to_vec(),
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(
        &self,
        message: &str,
        pinned_context: &[String],
    ) -> Result<ChatReply, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((message.to_string(), pinned_context.to_vec()));

        let gate = self.gate.lock().unwrap().take();
        self.entered.notify_one();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("No mock reply queued".to_string())))
    }
}
