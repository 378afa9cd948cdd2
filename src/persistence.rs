//! Durable storage seam for the session snapshot
//!
//! The store writes the whole persisted subset after every mutation and reads
//! it back once at startup. Failures are reported, never fatal.

use crate::db::{Database, DbError};
use crate::session::PersistedSession;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Fixed key under which the session record is stored
pub const STORE_NAMESPACE: &str = "teammate-store";

/// Version of the stored envelope
pub const STORE_VERSION: u32 = 0;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
    #[error("Stored session is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Unsupported stored session version {0}")]
    UnsupportedVersion(u32),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Serialized form: the session state plus a format version
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    state: PersistedSession,
}

pub fn encode(session: &PersistedSession) -> Result<String, PersistenceError> {
    let envelope = Envelope {
        version: STORE_VERSION,
        state: session.clone(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode(raw: &str) -> Result<PersistedSession, PersistenceError> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    if envelope.version != STORE_VERSION {
        return Err(PersistenceError::UnsupportedVersion(envelope.version));
    }
    Ok(envelope.state)
}

/// Key-value storage of the serialized session
pub trait SnapshotStore: Send + Sync {
    /// Read the stored session, `Ok(None)` if nothing was saved yet
    fn load(&self) -> Result<Option<PersistedSession>, PersistenceError>;

    /// Overwrite the stored session
    fn save(&self, session: &PersistedSession) -> Result<(), PersistenceError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<PersistedSession>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, session: &PersistedSession) -> Result<(), PersistenceError> {
        (**self).save(session)
    }
}

// ============================================================================
// SQLite adapter
// ============================================================================

impl SnapshotStore for Database {
    fn load(&self) -> Result<Option<PersistedSession>, PersistenceError> {
        match self.get_value(STORE_NAMESPACE)? {
            Some(raw) => decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), PersistenceError> {
        let raw = encode(session)?;
        self.put_value(STORE_NAMESPACE, &raw)?;
        Ok(())
    }
}

// ============================================================================
// In-memory adapter
// ============================================================================

/// Holds the serialized record in memory; used in tests and when no
/// database file is configured
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already-serialized record (may be garbage)
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedSession>, PersistenceError> {
        match self.raw.lock().unwrap().as_deref() {
            Some(raw) => decode(raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), PersistenceError> {
        let raw = encode(session)?;
        *self.raw.lock().unwrap() = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose every operation fails
    #[derive(Default)]
    pub struct FailingStore {
        pub save_attempts: AtomicUsize,
    }

    impl FailingStore {
        pub fn attempts(&self) -> usize {
            self.save_attempts.load(Ordering::SeqCst)
        }
    }

    impl SnapshotStore for FailingStore {
        fn load(&self) -> Result<Option<PersistedSession>, PersistenceError> {
            Err(PersistenceError::Unavailable("disk on fire".to_string()))
        }

        fn save(&self, _session: &PersistedSession) -> Result<(), PersistenceError> {
            self.save_attempts.fetch_add(1, Ordering::SeqCst);
            Err(PersistenceError::Unavailable("disk on fire".to_string()))
        }
    }
}
