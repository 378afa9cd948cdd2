//! API request and response types
//!
//! Shared by the backend handlers and the HTTP transport client.

use serde::{Deserialize, Serialize};

/// Request to generate a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub pinned_context: Vec<String>,
}

/// Actions the client may offer on a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Copy,
    Regenerate,
    AddNote,
    CreateTask,
}

impl SuggestedAction {
    pub const ALL: [SuggestedAction; 4] = [
        SuggestedAction::Copy,
        SuggestedAction::Regenerate,
        SuggestedAction::AddNote,
        SuggestedAction::CreateTask,
    ];
}

/// Token usage reported by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A complete reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: String,
    pub message_id: String,
    pub assistant_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
    pub suggested_actions: Vec<SuggestedAction>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
