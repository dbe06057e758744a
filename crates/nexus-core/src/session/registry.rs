//! SessionRegistry - the single owner of live sessions.
//!
//! Lookups go through one map lock that is held only long enough to find,
//! insert or remove an entry. All per-session work then happens under that
//! session's own lock, so operations on different keys never wait on each
//! other. Lock order is always slot -> history -> map; readers clone the
//! slot handles and release the map before touching any slot.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::clock::{Clock, SystemClock};
use super::record::{CompletedRecord, SessionStatus};
use super::state::{derive_alerts, Alert, Session, SessionKey, SessionStart, SessionUpdate};
use crate::config::EngineConfig;
use crate::event_bus::{EventSender, SessionEvent};
use crate::mission::ObjectiveCatalog;
use crate::persistence::{NullStore, SessionStore};
use crate::scoring::{PerformanceInputs, PerformanceResult, Scorer};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Session already exists: {0}")]
    DuplicateKey(SessionKey),

    #[error("Session not found: {0}")]
    NotFound(SessionKey),

    #[error("Invalid session update: {0}")]
    Validation(String),
}

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub session: Session,
    pub alerts: Vec<Alert>,
}

struct Slot {
    session: Session,
    /// Set by whichever of complete/evict wins. A retired slot is about to
    /// leave the map and must be treated as absent.
    retired: bool,
}

type SlotHandle = Arc<Mutex<Slot>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Concurrency-safe store of active sessions and completed history.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, SlotHandle>>,
    history: Mutex<Vec<CompletedRecord>>,
    catalog: Arc<ObjectiveCatalog>,
    scorer: Scorer,
    time_budget: u32,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SessionStore>,
    events: EventSender,
}

impl SessionRegistry {
    pub fn new(config: &EngineConfig, catalog: Arc<ObjectiveCatalog>, events: EventSender) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            scorer: Scorer::new(catalog.len(), config.mission_time_budget),
            time_budget: config.mission_time_budget,
            catalog,
            clock: Arc::new(SystemClock),
            store: Arc::new(NullStore),
            events,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn catalog(&self) -> &ObjectiveCatalog {
        &self.catalog
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Event channel closed; dropping session event");
        }
    }

    fn slot(&self, key: &SessionKey) -> Result<SlotHandle, RegistryError> {
        lock(&self.sessions)
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    fn slots(&self) -> Vec<SlotHandle> {
        lock(&self.sessions).values().cloned().collect()
    }

    /// Drop the map entry for `key` if it still points at `handle`.
    fn unlink(&self, key: &SessionKey, handle: &SlotHandle) {
        let mut sessions = lock(&self.sessions);
        if sessions.get(key).is_some_and(|current| Arc::ptr_eq(current, handle)) {
            sessions.remove(key);
        }
    }

    /// Start a session. Fails if the key is already live.
    pub fn start(&self, start: SessionStart) -> Result<Session, RegistryError> {
        let snapshot = {
            let mut sessions = lock(&self.sessions);
            if sessions.contains_key(&start.key) {
                return Err(RegistryError::DuplicateKey(start.key));
            }
            let key = start.key.clone();
            let session = Session::new(start, self.time_budget, self.clock.now());
            let snapshot = session.clone();
            sessions.insert(
                key,
                Arc::new(Mutex::new(Slot {
                    session,
                    retired: false,
                })),
            );
            self.emit(SessionEvent::SessionStarted {
                session_id: snapshot.session_id.clone(),
                team_name: snapshot.team_name.clone(),
                agent_role: snapshot.selected_agent,
            });
            snapshot
        };

        log::info!(
            "Session started: {} - {} ({})",
            snapshot.session_id,
            snapshot.team_name,
            snapshot.selected_agent.as_str()
        );
        if let Err(e) = self.store.save_session(&snapshot) {
            log::warn!("Failed to persist session {}: {}", snapshot.session_id, e);
        }
        Ok(snapshot)
    }

    /// Apply a partial update and return the post-update snapshot with alerts.
    pub fn update(&self, key: &SessionKey, update: &SessionUpdate) -> Result<UpdateOutcome, RegistryError> {
        let handle = self.slot(key)?;
        let mut slot = lock(&handle);
        if slot.retired {
            return Err(RegistryError::NotFound(key.clone()));
        }

        slot.session
            .apply(update, &self.catalog, self.time_budget)
            .map_err(RegistryError::Validation)?;
        slot.session.last_activity = self.clock.now();

        let alerts = derive_alerts(&slot.session);
        let snapshot = slot.session.clone();
        self.emit(SessionEvent::SessionUpdated {
            session_id: key.clone(),
            data: snapshot.clone(),
            alerts: alerts.clone(),
        });

        Ok(UpdateOutcome {
            session: snapshot,
            alerts,
        })
    }

    /// Score the session and move it into history.
    ///
    /// Exactly one of `complete`/`evict` succeeds for a live key; the loser
    /// gets `NotFound`, so scoring never runs twice.
    pub fn complete(
        &self,
        key: &SessionKey,
        inputs: &PerformanceInputs,
    ) -> Result<PerformanceResult, RegistryError> {
        let handle = self.slot(key)?;
        let record = {
            let mut slot = lock(&handle);
            if slot.retired {
                return Err(RegistryError::NotFound(key.clone()));
            }

            let completed_at = self.clock.now();
            let performance = self.scorer.score(&slot.session, inputs, completed_at);
            slot.retired = true;

            let record = CompletedRecord {
                session: slot.session.clone(),
                performance,
                completed_at,
            };
            // History first: the key is never absent from both places.
            lock(&self.history).push(record.clone());
            self.unlink(key, &handle);

            self.emit(SessionEvent::SessionCompleted {
                session_id: key.clone(),
                team_name: record.session.team_name.clone(),
                final_score: record.performance.final_score,
                rank: record.performance.final_rank,
            });
            record
        };

        log::info!(
            "Session completed: {} - Score: {:.1} ({})",
            key,
            record.performance.final_score,
            record.performance.final_rank
        );
        if let Err(e) = self.store.update_session_outcome(key, &record) {
            log::warn!("Failed to persist outcome for {}: {}", key, e);
        }
        Ok(record.performance)
    }

    /// Remove a live session without producing a record.
    pub fn evict(&self, key: &SessionKey) -> Result<Session, RegistryError> {
        self.evict_where(key, |_| true)?
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    /// Evict `key` only if it has been idle for longer than `threshold` at `now`.
    ///
    /// The idleness check runs under the session's lock, so an update that
    /// lands after the reaper's scan keeps the session alive. Returns
    /// `Ok(None)` when the session was active recently enough to stay.
    pub fn evict_if_idle(
        &self,
        key: &SessionKey,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, RegistryError> {
        self.evict_where(key, |session| now.signed_duration_since(session.last_activity) > threshold)
    }

    fn evict_where(
        &self,
        key: &SessionKey,
        should_evict: impl FnOnce(&Session) -> bool,
    ) -> Result<Option<Session>, RegistryError> {
        let handle = self.slot(key)?;
        let mut slot = lock(&handle);
        if slot.retired {
            return Err(RegistryError::NotFound(key.clone()));
        }
        if !should_evict(&slot.session) {
            return Ok(None);
        }

        slot.retired = true;
        self.unlink(key, &handle);
        self.emit(SessionEvent::SessionEvicted {
            session_id: key.clone(),
        });
        Ok(Some(slot.session.clone()))
    }

    /// Snapshot of one live session.
    pub fn get(&self, key: &SessionKey) -> Result<Session, RegistryError> {
        let handle = self.slot(key)?;
        let slot = lock(&handle);
        if slot.retired {
            return Err(RegistryError::NotFound(key.clone()));
        }
        Ok(slot.session.clone())
    }

    /// Active snapshot if live, otherwise the most recent completed record.
    pub fn lookup(&self, key: &SessionKey) -> Result<SessionStatus, RegistryError> {
        if let Ok(session) = self.get(key) {
            return Ok(SessionStatus::Active { data: session });
        }
        lock(&self.history)
            .iter()
            .rev()
            .find(|record| &record.session.session_id == key)
            .map(|record| SessionStatus::Completed {
                performance: record.performance.clone(),
            })
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    /// Snapshots of every live session, in no particular order.
    pub fn active_snapshots(&self) -> Vec<Session> {
        self.slots()
            .iter()
            .filter_map(|handle| {
                let slot = lock(handle);
                (!slot.retired).then(|| slot.session.clone())
            })
            .collect()
    }

    /// Number of live sessions. Retired slots still waiting to be unlinked
    /// are not counted, so this agrees with `active_snapshots`.
    pub fn active_count(&self) -> usize {
        self.slots().iter().filter(|handle| !lock(handle).retired).count()
    }

    /// Completed records in completion order.
    pub fn history(&self) -> Vec<CompletedRecord> {
        lock(&self.history).clone()
    }

    pub fn completed_count(&self) -> usize {
        lock(&self.history).len()
    }

    /// Seed history with records loaded from the persistence store.
    pub fn restore_history(&self, records: Vec<CompletedRecord>) {
        let count = records.len();
        lock(&self.history).extend(records);
        log::info!("Restored {} completed sessions", count);
    }
}
