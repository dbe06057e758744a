//! Aggregate counters over active sessions and completed history.
//!
//! The aggregator builds an [`AnalyticsSnapshot`] from registry snapshots and
//! stores it in an [`AnalyticsCache`]. It never writes session data.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::mission::{
    AgentRole, DifficultyMode, MissionPhase, MissionRank, ObjectiveCatalog, ThreatLevel,
};
use crate::monitors::MonitorError;
use crate::session::{CompletedRecord, Session};

/// Per-phase average minutes. Phase transitions are not timestamped yet, so
/// these are fixed reference values.
const PHASE_TIMING_MINUTES: [(MissionPhase, f64); 3] = [
    (MissionPhase::Beachhead, 28.5),
    (MissionPhase::Penetration, 26.3),
    (MissionPhase::Extraction, 29.1),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectiveRate {
    pub name: String,
    pub phase: MissionPhase,
    /// Share of all known sessions (active + completed) that finished this objective.
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_completed: usize,
    /// Completed as a percentage of all sessions.
    pub completion_rate: f64,
    pub average_score: f64,
    /// Mean elapsed minutes of currently active sessions.
    pub average_session_duration: f64,
    pub popular_roles: BTreeMap<AgentRole, usize>,
    pub difficulty_distribution: BTreeMap<DifficultyMode, usize>,
    pub current_threat_levels: BTreeMap<ThreatLevel, usize>,
    pub performance_distribution: BTreeMap<MissionRank, usize>,
    pub objective_completion_rates: BTreeMap<u32, ObjectiveRate>,
    pub phase_completion_times: BTreeMap<MissionPhase, f64>,
    pub computed_at: Option<DateTime<Utc>>,
}

impl Default for AnalyticsSnapshot {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            active_sessions: 0,
            total_completed: 0,
            completion_rate: 0.0,
            average_score: 0.0,
            average_session_duration: 0.0,
            popular_roles: AgentRole::ALL.iter().map(|r| (*r, 0)).collect(),
            difficulty_distribution: DifficultyMode::ALL.iter().map(|d| (*d, 0)).collect(),
            current_threat_levels: ThreatLevel::ALL.iter().map(|t| (*t, 0)).collect(),
            performance_distribution: MissionRank::ALL.iter().map(|r| (*r, 0)).collect(),
            objective_completion_rates: BTreeMap::new(),
            phase_completion_times: PHASE_TIMING_MINUTES.into_iter().collect(),
            computed_at: None,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Recompute every counter from scratch.
pub fn compute(
    active: &[Session],
    history: &[CompletedRecord],
    catalog: &ObjectiveCatalog,
    now: DateTime<Utc>,
) -> Result<AnalyticsSnapshot, MonitorError> {
    let mut snapshot = AnalyticsSnapshot::default();
    let total = active.len() + history.len();

    snapshot.active_sessions = active.len();
    snapshot.total_completed = history.len();
    snapshot.total_sessions = total;
    if total > 0 {
        snapshot.completion_rate = history.len() as f64 / total as f64 * 100.0;
    }

    snapshot.average_score = mean(history.iter().map(|r| r.performance.final_score));
    if !snapshot.average_score.is_finite() {
        return Err(MonitorError::Computation(
            "average score is not a finite number".to_string(),
        ));
    }
    snapshot.average_session_duration = mean(
        active
            .iter()
            .map(|s| now.signed_duration_since(s.start_time).num_seconds().max(0) as f64 / 60.0),
    );

    let all_sessions = active.iter().chain(history.iter().map(|r| &r.session));
    for session in all_sessions {
        *snapshot.popular_roles.entry(session.selected_agent).or_insert(0) += 1;
        *snapshot
            .difficulty_distribution
            .entry(session.difficulty_mode)
            .or_insert(0) += 1;
    }
    for session in active {
        *snapshot
            .current_threat_levels
            .entry(session.threat_level)
            .or_insert(0) += 1;
    }
    for record in history {
        *snapshot
            .performance_distribution
            .entry(record.performance.final_rank)
            .or_insert(0) += 1;
    }

    let denominator = total.max(1) as f64;
    for objective in catalog.iter() {
        let done = active
            .iter()
            .chain(history.iter().map(|r| &r.session))
            .filter(|s| s.objectives_completed.contains(&objective.id))
            .count();
        snapshot.objective_completion_rates.insert(
            objective.id,
            ObjectiveRate {
                name: objective.name.clone(),
                phase: objective.phase,
                completion_rate: done as f64 / denominator * 100.0,
            },
        );
    }

    snapshot.computed_at = Some(now);
    Ok(snapshot)
}

/// Latest analytics snapshot, written only by the aggregator.
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    latest: RwLock<AnalyticsSnapshot>,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> AnalyticsSnapshot {
        self.latest.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn store(&self, snapshot: AnalyticsSnapshot) {
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{PerformanceInputs, Scorer};
    use crate::session::{SessionKey, SessionStart};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn session(key: &str, role: AgentRole, difficulty: DifficultyMode, objectives: &[u32]) -> Session {
        let mut s = Session::new(
            SessionStart {
                key: SessionKey::new(key),
                team_name: key.to_string(),
                role,
                agent_color: "#000000".to_string(),
                difficulty,
            },
            5280,
            t0(),
        );
        s.objectives_completed = objectives.iter().copied().collect();
        s
    }

    fn completed(s: Session) -> CompletedRecord {
        let performance = Scorer::new(9, 5280).score(&s, &PerformanceInputs::default(), t0());
        CompletedRecord {
            session: s,
            performance,
            completed_at: t0(),
        }
    }

    #[test]
    fn empty_state_has_zeroed_buckets() {
        let snapshot = compute(&[], &[], &ObjectiveCatalog::standard(), t0()).unwrap();
        assert_eq!(snapshot.total_sessions, 0);
        assert_eq!(snapshot.completion_rate, 0.0);
        assert_eq!(snapshot.average_score, 0.0);
        assert_eq!(snapshot.popular_roles[&AgentRole::Hacker], 0);
        assert_eq!(snapshot.performance_distribution.len(), 6);
        assert_eq!(snapshot.objective_completion_rates.len(), 9);
        assert_eq!(snapshot.phase_completion_times[&MissionPhase::Penetration], 26.3);
        assert_eq!(snapshot.computed_at, Some(t0()));
    }

    #[test]
    fn counts_active_and_completed_sessions() {
        let mut hot = session("a", AgentRole::Hacker, DifficultyMode::Tactical, &[1, 2]);
        hot.threat_level = ThreatLevel::Critical;
        let active = vec![hot, session("b", AgentRole::Infiltrator, DifficultyMode::Casual, &[1])];
        let history = vec![completed(session("c", AgentRole::Infiltrator, DifficultyMode::Hardened, &[1, 2, 3]))];

        let now = t0() + Duration::minutes(30);
        let snapshot = compute(&active, &history, &ObjectiveCatalog::standard(), now).unwrap();

        assert_eq!(snapshot.total_sessions, 3);
        assert_eq!(snapshot.active_sessions, 2);
        assert_eq!(snapshot.total_completed, 1);
        assert!((snapshot.completion_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.average_score, history[0].performance.final_score);
        assert_eq!(snapshot.average_session_duration, 30.0);

        assert_eq!(snapshot.popular_roles[&AgentRole::Infiltrator], 2);
        assert_eq!(snapshot.popular_roles[&AgentRole::Hacker], 1);
        assert_eq!(snapshot.difficulty_distribution[&DifficultyMode::Hardened], 1);
        assert_eq!(snapshot.current_threat_levels[&ThreatLevel::Critical], 1);
        assert_eq!(snapshot.current_threat_levels[&ThreatLevel::Low], 1);
        assert_eq!(snapshot.performance_distribution[&history[0].performance.final_rank], 1);

        assert_eq!(snapshot.objective_completion_rates[&1].completion_rate, 100.0);
        assert!((snapshot.objective_completion_rates[&3].completion_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.objective_completion_rates[&9].completion_rate, 0.0);
    }

    #[test]
    fn non_finite_scores_fail_the_cycle() {
        let mut record = completed(session("x", AgentRole::Hacker, DifficultyMode::Tactical, &[]));
        record.performance.final_score = f64::NAN;
        let err = compute(&[], &[record], &ObjectiveCatalog::standard(), t0()).unwrap_err();
        assert!(matches!(err, MonitorError::Computation(_)));
    }

    #[test]
    fn snapshot_serializes_enum_keys_as_wire_names() {
        let snapshot = compute(&[], &[], &ObjectiveCatalog::standard(), t0()).unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["popular_roles"]["hacker"], 0);
        assert_eq!(json["difficulty_distribution"]["TACTICAL"], 0);
        assert_eq!(json["phase_completion_times"]["PHASE_01_BEACHHEAD"], 28.5);
        assert_eq!(json["objective_completion_rates"]["4"]["name"], "Bypass biometric gateway");
    }

    #[test]
    fn cache_returns_latest_snapshot() {
        let cache = AnalyticsCache::new();
        assert_eq!(cache.get().computed_at, None);

        let snapshot = compute(&[], &[], &ObjectiveCatalog::standard(), t0()).unwrap();
        cache.store(snapshot.clone());
        assert_eq!(cache.get(), snapshot);
    }
}
