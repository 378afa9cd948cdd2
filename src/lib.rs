//! Teammate - a conversational session manager
//!
//! The session engine keeps the chat transcript, pinned context, notes and
//! tasks in one store, reveals backend replies incrementally, and persists
//! the session to SQLite. The chat backend the client talks to lives here
//! too.

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod api;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod db;
pub mod delivery;
pub mod llm;
pub mod persistence;
pub mod session;
pub mod system_prompt;
pub mod transport;
