//! Best-effort persistence of sessions and their outcomes.
//!
//! The registry calls a [`SessionStore`] after each start and completion.
//! Failures are logged by the caller and never roll back in-memory state.
//!
//! # File Locations
//!
//! [`JsonlStore`] keeps two append-only files under its data directory:
//!
//! ```text
//! <data-dir>/
//! ├── sessions.jsonl   # One line per started session
//! └── outcomes.jsonl   # One CompletedRecord per line
//! ```

mod jsonl;

use thiserror::Error;

use crate::session::{CompletedRecord, Session, SessionKey};

pub use jsonl::JsonlStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait SessionStore: Send + Sync {
    fn save_session(&self, session: &Session) -> Result<(), StoreError>;

    fn update_session_outcome(&self, key: &SessionKey, record: &CompletedRecord) -> Result<(), StoreError>;

    /// Previously completed records, oldest first.
    fn load_completed(&self) -> Result<Vec<CompletedRecord>, StoreError>;
}

/// Store that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl SessionStore for NullStore {
    fn save_session(&self, _session: &Session) -> Result<(), StoreError> {
        Ok(())
    }

    fn update_session_outcome(&self, _key: &SessionKey, _record: &CompletedRecord) -> Result<(), StoreError> {
        Ok(())
    }

    fn load_completed(&self) -> Result<Vec<CompletedRecord>, StoreError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_store_loads_nothing() {
        assert!(NullStore.load_completed().unwrap().is_empty());
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::from(std::io::Error::other("boom"));
        assert!(err.to_string().contains("boom"));

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(StoreError::from(json_err).to_string().starts_with("JSON error"));
    }
}
