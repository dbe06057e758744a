//! Periodic background work: the inactivity reaper and the analytics aggregator.
//!
//! Both run as independent tokio tasks and reach the registry only through
//! its public operations. A failed cycle is logged and the loop carries on
//! with the next tick.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::analytics::{self, AnalyticsCache};
use crate::session::{RegistryError, SessionKey, SessionRegistry};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    #[error("Invalid monitor configuration: {0}")]
    Config(String),

    #[error("Analytics computation failed: {0}")]
    Computation(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One reaper pass: evict every session idle for longer than `threshold`.
///
/// Sessions that complete or get evicted elsewhere between the scan and the
/// eviction are skipped.
pub fn reap_idle(registry: &SessionRegistry, threshold: Duration) -> Result<Vec<SessionKey>, MonitorError> {
    let threshold = chrono::Duration::from_std(threshold)
        .map_err(|e| MonitorError::Config(format!("inactivity threshold out of range: {e}")))?;
    let now = registry.now();

    let mut evicted = Vec::new();
    for session in registry.active_snapshots() {
        if now.signed_duration_since(session.last_activity) <= threshold {
            continue;
        }
        match registry.evict_if_idle(&session.session_id, threshold, now) {
            Ok(Some(_)) => {
                log::info!("Cleaning up inactive session: {}", session.session_id);
                evicted.push(session.session_id);
            }
            Ok(None) | Err(RegistryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(evicted)
}

/// One aggregator pass: rebuild the analytics snapshot and cache it.
pub fn refresh_analytics(registry: &SessionRegistry, cache: &AnalyticsCache) -> Result<(), MonitorError> {
    let active = registry.active_snapshots();
    let history = registry.history();
    let snapshot = analytics::compute(&active, &history, registry.catalog(), registry.now())?;
    cache.store(snapshot);
    Ok(())
}

pub fn spawn_reaper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    threshold: Duration,
) -> JoinHandle<()> {
    log::info!(
        "Session reaper started (interval {}s, inactivity threshold {}s)",
        interval.as_secs(),
        threshold.as_secs()
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match reap_idle(&registry, threshold) {
                Ok(evicted) if !evicted.is_empty() => {
                    log::debug!("Reaper evicted {} sessions", evicted.len());
                }
                Ok(_) => {}
                Err(e) => log::error!("Session monitor error: {}", e),
            }
        }
    })
}

pub fn spawn_analytics(
    registry: Arc<SessionRegistry>,
    cache: Arc<AnalyticsCache>,
    interval: Duration,
) -> JoinHandle<()> {
    log::info!("Analytics aggregator started (interval {}s)", interval.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = refresh_analytics(&registry, &cache) {
                log::error!("Analytics update error: {}", e);
            }
        }
    })
}
