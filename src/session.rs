//! Session state engine
//!
//! Entities, their factories, and the store that owns them.

mod store;
mod types;

#[cfg(test)]
mod proptests;

pub use store::{Change, SessionStore, StoreError, StoreResult, StoreUpdate};
pub use types::*;
