//! The session store
//!
//! Single owner of the transcript, pinned context, notes and tasks. Every
//! operation commits under one lock, writes the durable subset through the
//! persistence adapter and then notifies subscribers with a full snapshot, so
//! observers never see a half-applied mutation.

use super::types::{
    new_id, Message, NewNote, NewTask, Note, NotePatch, PersistedSession, Role, SessionSnapshot,
    Task, TaskPatch,
};
use crate::persistence::SnapshotStore;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the update channel before slow subscribers start lagging
const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl StoreError {
    fn note_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "Note",
            id: id.to_string(),
        }
    }

    fn task_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "Task",
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What a committed mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    UserMessageAdded,
    AssistantMessageUpserted,
    AssistantMessageFinished,
    StreamingChanged,
    SessionCleared,
    PinnedContextChanged,
    NoteCreated,
    NoteUpdated,
    NoteDeleted,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
}

/// Notification sent to subscribers after each committed mutation
#[derive(Debug, Clone)]
pub struct StoreUpdate {
    pub revision: u64,
    pub change: Change,
    pub snapshot: Arc<SessionSnapshot>,
}

struct StoreState {
    session: SessionSnapshot,
    revision: u64,
}

pub struct SessionStore {
    state: Mutex<StoreState>,
    persistence: Arc<dyn SnapshotStore>,
    updates: broadcast::Sender<StoreUpdate>,
}

impl SessionStore {
    /// Create a store with an empty session
    pub fn new(persistence: Arc<dyn SnapshotStore>) -> Self {
        Self::from_persisted(PersistedSession::default(), persistence)
    }

    /// Create a store from whatever `persistence` holds.
    ///
    /// A missing, unreadable or corrupt record yields an empty session.
    pub fn restore(persistence: Arc<dyn SnapshotStore>) -> Self {
        let persisted = match persistence.load() {
            Ok(Some(persisted)) => {
                tracing::info!(
                    session_id = %persisted.session_id,
                    messages = persisted.messages.len(),
                    notes = persisted.notes.len(),
                    tasks = persisted.tasks.len(),
                    "Restored session"
                );
                persisted
            }
            Ok(None) => {
                tracing::debug!("No stored session, starting empty");
                PersistedSession::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to restore session, starting empty");
                PersistedSession::default()
            }
        };
        Self::from_persisted(persisted, persistence)
    }

    fn from_persisted(persisted: PersistedSession, persistence: Arc<dyn SnapshotStore>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(StoreState {
                session: persisted.into(),
                revision: 0,
            }),
            persistence,
            updates,
        }
    }

    /// Subscribe to committed mutations
    pub fn subscribe(&self) -> broadcast::Receiver<StoreUpdate> {
        self.updates.subscribe()
    }

    /// Apply `mutate` atomically, persist and notify.
    ///
    /// `mutate` must leave the session untouched when it returns an error.
    fn commit<T>(
        &self,
        change: Change,
        mutate: impl FnOnce(&mut SessionSnapshot) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut state = self.state.lock().unwrap();
        let value = mutate(&mut state.session)?;
        state.revision += 1;

        self.persist(&state.session);

        if self.updates.receiver_count() > 0 {
            // Only fails when every receiver dropped in between
            let _ = self.updates.send(StoreUpdate {
                revision: state.revision,
                change,
                snapshot: Arc::new(state.session.clone()),
            });
        }

        Ok(value)
    }

    fn persist(&self, session: &SessionSnapshot) {
        let persisted = PersistedSession {
            session_id: session.session_id.clone(),
            messages: session.messages.clone(),
            pinned_context: session.pinned_context.clone(),
            notes: session.notes.clone(),
            tasks: session.tasks.clone(),
        };
        if let Err(e) = self.persistence.save(&persisted) {
            tracing::warn!(
                session_id = %session.session_id,
                error = %e,
                "Failed to persist session"
            );
        }
    }

    // ==================== Chat ====================

    /// Append a user message, starting a new turn
    pub fn add_user_message(&self, content: &str) -> StoreResult<Message> {
        if content.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "message content is empty".to_string(),
            ));
        }
        self.commit(Change::UserMessageAdded, |session| {
            let message = Message::user(content);
            session.messages.push(message.clone());
            session.active_assistant_message_id = None;
            Ok(message)
        })
    }

    /// Rewrite the active assistant message, or append one and make it active
    pub fn upsert_assistant_message(&self, content: &str) -> StoreResult<Message> {
        self.commit(Change::AssistantMessageUpserted, |session| {
            let active = session.active_assistant_message_id.as_deref().and_then(|id| {
                session
                    .messages
                    .iter()
                    .position(|m| m.id == id && m.role == Role::Assistant)
            });

            if let Some(index) = active {
                let message = &mut session.messages[index];
                content.clone_into(&mut message.content);
                return Ok(message.clone());
            }

            let message = Message::assistant(content);
            session.active_assistant_message_id = Some(message.id.clone());
            session.messages.push(message.clone());
            Ok(message)
        })
    }

    /// Set the transient streaming flag. Does not stop any delivery.
    pub fn set_streaming(&self, streaming: bool) {
        let _ = self.commit(Change::StreamingChanged, |session| {
            session.is_streaming = streaming;
            Ok(())
        });
    }

    /// End the current turn: drop the active pointer and leave streaming.
    ///
    /// Returns the message that was active, if any.
    pub fn finish_assistant_message(&self) -> Option<Message> {
        self.commit(Change::AssistantMessageFinished, |session| {
            let finished = session
                .active_assistant_message_id
                .take()
                .and_then(|id| session.messages.iter().find(|m| m.id == id).cloned());
            session.is_streaming = false;
            Ok(finished)
        })
        .ok()
        .flatten()
    }

    /// Start a fresh chat. Notes, tasks and pinned context survive.
    pub fn clear_session(&self) -> String {
        let session_id = new_id();
        let id = session_id.clone();
        let _ = self.commit(Change::SessionCleared, move |session| {
            session.session_id = id;
            session.messages.clear();
            session.active_assistant_message_id = None;
            session.is_streaming = false;
            Ok(())
        });
        tracing::info!(session_id = %session_id, "Session cleared");
        session_id
    }

    /// Replace pinned context; items are trimmed and blanks dropped
    pub fn set_pinned_context<I, S>(&self, items: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items
            .into_iter()
            .map(|item| item.as_ref().trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        let pinned = items.clone();
        let _ = self.commit(Change::PinnedContextChanged, move |session| {
            session.pinned_context = items;
            Ok(())
        });
        pinned
    }

    // ==================== Notes ====================

    pub fn create_note(&self, fields: NewNote) -> Note {
        let note = Note::new(fields);
        let created = note.clone();
        let _ = self.commit(Change::NoteCreated, move |session| {
            session.notes.insert(0, note);
            Ok(())
        });
        created
    }

    pub fn update_note(&self, id: &str, patch: NotePatch) -> StoreResult<Note> {
        self.commit(Change::NoteUpdated, |session| {
            let note = session
                .notes
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| StoreError::note_not_found(id))?;
            note.apply(patch);
            Ok(note.clone())
        })
    }

    pub fn delete_note(&self, id: &str) -> StoreResult<Note> {
        self.commit(Change::NoteDeleted, |session| {
            let index = session
                .notes
                .iter()
                .position(|n| n.id == id)
                .ok_or_else(|| StoreError::note_not_found(id))?;
            Ok(session.notes.remove(index))
        })
    }

    // ==================== Tasks ====================

    pub fn create_task(&self, fields: NewTask) -> Task {
        let task = Task::new(fields);
        let created = task.clone();
        let _ = self.commit(Change::TaskCreated, move |session| {
            session.tasks.insert(0, task);
            Ok(())
        });
        created
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        self.commit(Change::TaskUpdated, |session| {
            let task = session
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| StoreError::task_not_found(id))?;
            task.apply(patch);
            Ok(task.clone())
        })
    }

    /// Flip a task between pending and done
    pub fn toggle_task(&self, id: &str) -> StoreResult<Task> {
        self.commit(Change::TaskUpdated, |session| {
            let task = session
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| StoreError::task_not_found(id))?;
            task.apply(TaskPatch::status(task.status.toggled()));
            Ok(task.clone())
        })
    }

    pub fn delete_task(&self, id: &str) -> StoreResult<Task> {
        self.commit(Change::TaskDeleted, |session| {
            let index = session
                .tasks
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| StoreError::task_not_found(id))?;
            Ok(session.tasks.remove(index))
        })
    }

    // ==================== Reads ====================

    fn read<T>(&self, f: impl FnOnce(&SessionSnapshot) -> T) -> T {
        f(&self.state.lock().unwrap().session)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read(Clone::clone)
    }

    /// Number of mutations committed since the store was created
    pub fn revision(&self) -> u64 {
        self.state.lock().unwrap().revision
    }

    pub fn session_id(&self) -> String {
        self.read(|s| s.session_id.clone())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.read(|s| s.messages.clone())
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.read(|s| s.messages.iter().find(|m| m.id == id).cloned())
    }

    pub fn last_user_message(&self) -> Option<Message> {
        self.read(|s| {
            s.messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .cloned()
        })
    }

    pub fn last_assistant_message(&self) -> Option<Message> {
        self.read(|s| {
            s.messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
                .cloned()
        })
    }

    pub fn active_assistant_message_id(&self) -> Option<String> {
        self.read(|s| s.active_assistant_message_id.clone())
    }

    pub fn pinned_context(&self) -> Vec<String> {
        self.read(|s| s.pinned_context.clone())
    }

    pub fn notes(&self) -> Vec<Note> {
        self.read(|s| s.notes.clone())
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read(|s| s.tasks.clone())
    }

    pub fn is_streaming(&self) -> bool {
        self.read(|s| s.is_streaming)
    }
}
