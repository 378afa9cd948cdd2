//! HTTP API for the chat backend
//!
//! A single reply-generation endpoint plus a version probe.

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::llm::LlmService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Upstream model, or `None` to answer with the templated reply
    pub llm: Option<Arc<dyn LlmService>>,
}

impl AppState {
    pub fn new(llm: Option<Arc<dyn LlmService>>) -> Self {
        Self { llm }
    }
}
