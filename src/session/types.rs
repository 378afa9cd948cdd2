//! Session entities and their factories

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a fresh random (v4) identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Timestamp for a mutation of a record last stamped at `previous`.
///
/// Never returns a value at or before `previous`, even if the clock has not
/// moved (or moved backwards) since.
pub fn touch(previous: DateTime<Utc>) -> DateTime<Utc> {
    let current = now();
    if current > previous {
        current
    } else {
        previous + Duration::milliseconds(1)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            created_at: now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ============================================================================
// Notes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new note
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Partial update of a note; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Note {
    pub fn new(fields: NewNote) -> Self {
        let created_at = now();
        Self {
            id: new_id(),
            title: fields.title,
            content: fields.content,
            tags: normalize_tags(fields.tags),
            created_at,
            updated_at: created_at,
        }
    }

    pub fn apply(&mut self, patch: NotePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        self.updated_at = touch(self.updated_at);
    }
}

/// Trim tags, drop empty ones and duplicates (first occurrence wins)
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Done,
}

impl TaskStatus {
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Pending => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub tag: Option<String>,
    pub status: TaskStatus,
    pub description: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Partial update of a task.
///
/// Optional task fields use a nested `Option`: `Some(None)` clears the field.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub tag: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub description: Option<Option<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

impl Task {
    pub fn new(fields: NewTask) -> Self {
        let created_at = now();
        Self {
            id: new_id(),
            title: fields.title,
            due_date: fields.due_date,
            tag: fields.tag,
            status: fields.status,
            description: fields.description,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(tag) = patch.tag {
            self.tag = tag;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at = touch(self.updated_at);
    }
}

// ============================================================================
// Session records
// ============================================================================

/// The durable subset of the session.
///
/// Streaming status and the active assistant pointer are deliberately absent:
/// a restored session always starts idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub pinned_context: Vec<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Default for PersistedSession {
    fn default() -> Self {
        Self {
            session_id: new_id(),
            messages: Vec::new(),
            pinned_context: Vec::new(),
            notes: Vec::new(),
            tasks: Vec::new(),
        }
    }
}

/// Complete view of the store at one revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub pinned_context: Vec<String>,
    pub notes: Vec<Note>,
    pub tasks: Vec<Task>,
    pub is_streaming: bool,
    pub active_assistant_message_id: Option<String>,
}

impl SessionSnapshot {
    pub fn active_assistant_message(&self) -> Option<&Message> {
        let id = self.active_assistant_message_id.as_deref()?;
        self.messages.iter().find(|m| m.id == id)
    }
}

impl From<PersistedSession> for SessionSnapshot {
    fn from(persisted: PersistedSession) -> Self {
        Self {
            session_id: persisted.session_id,
            messages: persisted.messages,
            pinned_context: persisted.pinned_context,
            notes: persisted.notes,
            tasks: persisted.tasks,
            is_streaming: false,
            active_assistant_message_id: None,
        }
    }
}
