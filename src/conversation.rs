//! Conversation driver
//!
//! Runs one turn at a time: the user message is committed, the transport is
//! asked for a reply, and the reply is revealed into the store through the
//! delivery simulator. The driver is the only owner of the delivery handle,
//! so ending a turn (completion, stop, or a new send) always goes through
//! [`SessionStore::finish_assistant_message`].

use crate::delivery::{DeliveryHandle, DeliverySimulator};
use crate::session::{
    Message, NewNote, NewTask, Note, SessionStore, StoreError, StoreResult, Task,
};
use crate::transport::ChatTransport;
use std::sync::{Arc, Mutex};

/// Assistant text used when the transport fails
pub const FALLBACK_REPLY: &str = "Sorry, there was an error generating a response.";

const TITLE_LIMIT: usize = 60;

/// How a turn started by [`Conversation::send`] ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply is being revealed into this message
    Streaming { message_id: String },
    /// The transport failed; the fallback text was written and the turn ended
    Fallback { message_id: String, error: String },
    /// The turn was stopped or replaced before the reply arrived
    Superseded,
}

/// The current turn. Every transition of it happens under one lock.
#[derive(Default)]
struct Turn {
    /// Bumped whenever a turn starts or is ended from outside
    id: u64,
    delivery: Option<DeliveryHandle>,
}

pub struct Conversation<T: ChatTransport> {
    store: Arc<SessionStore>,
    transport: T,
    simulator: DeliverySimulator,
    turn: Arc<Mutex<Turn>>,
}

impl<T: ChatTransport> Conversation<T> {
    pub fn new(store: Arc<SessionStore>, transport: T, simulator: DeliverySimulator) -> Self {
        Self {
            store,
            transport,
            simulator,
            turn: Arc::new(Mutex::new(Turn::default())),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Send a user message and start revealing the reply.
    ///
    /// Fails only on blank input. Transport failures are absorbed into the
    /// transcript as the fallback reply.
    pub async fn send(&self, text: &str) -> StoreResult<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "message content is empty".to_string(),
            ));
        }

        let (turn_id, user) = {
            let mut turn = self.turn.lock().unwrap();
            self.end_turn(&mut turn);
            let user = self.store.add_user_message(text)?;
            self.store.set_streaming(true);
            (turn.id, user)
        };
        let pinned = self.store.pinned_context();

        tracing::info!(message_id = %user.id, pinned = pinned.len(), "Sending message");
        let result = self.transport.send(&user.content, &pinned).await;

        let mut turn = self.turn.lock().unwrap();
        if turn.id != turn_id {
            tracing::debug!("Turn ended before the reply arrived, dropping it");
            return Ok(TurnOutcome::Superseded);
        }

        match result {
            Ok(reply) => {
                let seeded = self.store.upsert_assistant_message("")?;
                turn.delivery = Some(self.start_delivery(reply.reply, turn_id));
                Ok(TurnOutcome::Streaming {
                    message_id: seeded.id,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Transport failed, writing fallback reply");
                let message = self.store.upsert_assistant_message(FALLBACK_REPLY)?;
                self.store.finish_assistant_message();
                Ok(TurnOutcome::Fallback {
                    message_id: message.id,
                    error: e.to_string(),
                })
            }
        }
    }

    fn start_delivery(&self, text: String, turn_id: u64) -> DeliveryHandle {
        let chunk_store = Arc::clone(&self.store);
        let done_store = Arc::clone(&self.store);
        let done_turn = Arc::clone(&self.turn);

        self.simulator.start(
            text,
            move |revealed| {
                if let Err(e) = chunk_store.upsert_assistant_message(revealed) {
                    tracing::warn!(error = %e, "Failed to reveal reply chunk");
                }
            },
            move || {
                // A newer turn may already own the store's active message
                let turn = done_turn.lock().unwrap();
                if turn.id == turn_id {
                    done_store.finish_assistant_message();
                    tracing::debug!("Delivery complete");
                }
            },
        )
    }

    /// End the current turn, cancelling its delivery if one is running.
    ///
    /// Returns the ended delivery so callers can wait for its task to exit.
    fn end_turn(&self, turn: &mut Turn) -> Option<DeliveryHandle> {
        turn.id += 1;
        let handle = turn.delivery.take()?;
        if handle.cancel() {
            self.store.finish_assistant_message();
        }
        Some(handle)
    }

    /// Stop the current turn. Revealed text is kept.
    pub async fn stop(&self) {
        let ended = {
            let mut turn = self.turn.lock().unwrap();
            let ended = self.end_turn(&mut turn);
            if self.store.is_streaming() {
                self.store.finish_assistant_message();
            }
            ended
        };
        if let Some(handle) = ended {
            handle.finished().await;
        }
        tracing::info!("Stopped");
    }

    /// Send the most recent user message again as a new turn
    pub async fn regenerate(&self) -> StoreResult<Option<TurnOutcome>> {
        let Some(last) = self.store.last_user_message() else {
            return Ok(None);
        };
        self.send(&last.content).await.map(Some)
    }

    fn find_message(&self, id: &str) -> StoreResult<Message> {
        self.store.message(id).ok_or_else(|| StoreError::NotFound {
            kind: "Message",
            id: id.to_string(),
        })
    }

    /// Save a message as a note titled after its first line
    pub fn add_note_from_message(&self, id: &str) -> StoreResult<Note> {
        let message = self.find_message(id)?;
        let title = note_title(&message.content);
        Ok(self.store.create_note(NewNote {
            title,
            content: message.content,
            tags: Vec::new(),
        }))
    }

    /// Create a pending task titled after the message's first non-empty line
    pub fn create_task_from_message(&self, id: &str) -> StoreResult<Task> {
        let message = self.find_message(id)?;
        Ok(self
            .store
            .create_task(NewTask::titled(task_title(&message.content))))
    }

    pub fn copy_text(&self, id: &str) -> StoreResult<String> {
        self.find_message(id).map(|m| m.content)
    }

    /// Stop any delivery and start a fresh session. Returns the new session id.
    pub async fn clear_session(&self) -> String {
        let (ended, session_id) = {
            let mut turn = self.turn.lock().unwrap();
            let ended = self.end_turn(&mut turn);
            (ended, self.store.clear_session())
        };
        if let Some(handle) = ended {
            handle.finished().await;
        }
        session_id
    }

    /// Resolve once the current delivery, if any, has ended
    pub async fn wait_for_delivery(&self) {
        let handle = self.turn.lock().unwrap().delivery.clone();
        if let Some(handle) = handle {
            handle.finished().await;
        }
    }

    pub fn is_delivering(&self) -> bool {
        self.turn
            .lock()
            .unwrap()
            .delivery
            .as_ref()
            .is_some_and(DeliveryHandle::is_active)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn note_title(content: &str) -> String {
    let title = truncate_chars(content.lines().next().unwrap_or(""), TITLE_LIMIT);
    if title.is_empty() {
        "Note".to_string()
    } else {
        title
    }
}

fn task_title(content: &str) -> String {
    content
        .lines()
        .find(|line| !line.trim().is_empty())
        .map_or_else(|| "Task".to_string(), |line| truncate_chars(line, TITLE_LIMIT))
}
