//! Append-only JSONL session store.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use super::{SessionStore, StoreError};
use crate::session::{CompletedRecord, Session, SessionKey};

const SESSIONS_FILE: &str = "sessions.jsonl";
const OUTCOMES_FILE: &str = "outcomes.jsonl";

/// Writes started sessions and completed records as one JSON object per line.
pub struct JsonlStore {
    dir: PathBuf,
    /// Serializes appends so concurrent writers never interleave lines.
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append<T: Serialize>(&self, file_name: &str, value: &T) -> Result<(), StoreError> {
        let line = serde_json::to_string(value)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file_name))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl SessionStore for JsonlStore {
    fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.append(SESSIONS_FILE, session)
    }

    fn update_session_outcome(&self, key: &SessionKey, record: &CompletedRecord) -> Result<(), StoreError> {
        debug_assert_eq!(key, &record.session.session_id);
        self.append(OUTCOMES_FILE, record)
    }

    /// Returns an empty list if nothing has been recorded yet. Lines that
    /// fail to parse are skipped with a warning.
    fn load_completed(&self) -> Result<Vec<CompletedRecord>, StoreError> {
        let path = self.dir.join(OUTCOMES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&path)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CompletedRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable outcome at line {}: {}", index + 1, e),
            }
        }
        Ok(records)
    }
}
