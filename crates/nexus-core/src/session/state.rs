//! Per-session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

use crate::mission::{AgentRole, DifficultyMode, MissionPhase, ObjectiveCatalog, ThreatLevel};

/// Client-chosen session key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity fields supplied when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub key: SessionKey,
    pub team_name: String,
    pub role: AgentRole,
    pub agent_color: String,
    pub difficulty: DifficultyMode,
}

/// One in-progress mission run.
///
/// The registry owns the live value; everything handed out is a clone, so a
/// returned `Session` never changes after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionKey,
    pub team_name: String,
    pub selected_agent: AgentRole,
    pub agent_color: String,

    /// Mission progress, 0..=100.
    pub mission_progress: f64,
    pub threat_level: ThreatLevel,
    pub objectives_completed: BTreeSet<u32>,
    /// Seconds left on the mission clock.
    pub time_remaining: u32,
    /// 0..=100, higher is better.
    pub stealth_rating: f64,
    /// 0..=100, higher is worse.
    pub trace_level: f64,
    pub current_phase: MissionPhase,

    pub difficulty_mode: DifficultyMode,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(start: SessionStart, time_budget: u32, now: DateTime<Utc>) -> Self {
        Self {
            session_id: start.key,
            team_name: start.team_name,
            selected_agent: start.role,
            agent_color: start.agent_color,
            mission_progress: 0.0,
            threat_level: ThreatLevel::Low,
            objectives_completed: BTreeSet::new(),
            time_remaining: time_budget,
            stealth_rating: 100.0,
            trace_level: 0.0,
            current_phase: MissionPhase::first(),
            difficulty_mode: start.difficulty,
            start_time: now,
            last_activity: now,
        }
    }

    /// Apply the fields present in `update`, leaving the rest unchanged.
    ///
    /// Validation happens before any write, so an `Err` leaves the session
    /// exactly as it was.
    pub fn apply(
        &mut self,
        update: &SessionUpdate,
        catalog: &ObjectiveCatalog,
        time_budget: u32,
    ) -> Result<(), String> {
        if let Some(ids) = &update.objectives_completed {
            if let Some(unknown) = ids.iter().find(|id| !catalog.contains(**id)) {
                return Err(format!("Unknown objective id: {unknown}"));
            }
        }

        if let Some(progress) = update.mission_progress {
            self.mission_progress = clamp_percent(progress);
        }
        if let Some(threat) = update.threat_level {
            self.threat_level = threat;
        }
        if let Some(ids) = &update.objectives_completed {
            self.objectives_completed = ids.iter().copied().collect();
        }
        if let Some(remaining) = update.time_remaining {
            self.time_remaining = remaining.min(time_budget);
        }
        if let Some(stealth) = update.stealth_rating {
            self.stealth_rating = clamp_percent(stealth);
        }
        if let Some(trace) = update.trace_level {
            self.trace_level = clamp_percent(trace);
        }
        if let Some(phase) = update.current_phase {
            self.current_phase = phase;
        }
        Ok(())
    }

    /// Completed objectives, capped at the catalog size.
    pub fn completed_count(&self, total_objectives: usize) -> usize {
        self.objectives_completed.len().min(total_objectives)
    }
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<ThreatLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives_completed: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stealth_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<MissionPhase>,
}

/// Warnings derived from a session's state after each update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    BurnStateImminent,
    HighTrace,
    UrgentTime,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Alert::BurnStateImminent => "CRITICAL: Trace level at 90% - Burn State imminent!",
            Alert::HighTrace => "WARNING: High trace level detected",
            Alert::UrgentTime => "URGENT: Less than 5 minutes remaining",
        };
        f.write_str(message)
    }
}

impl Serialize for Alert {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

const BURN_STATE_TRACE: f64 = 90.0;
const HIGH_TRACE: f64 = 75.0;
const URGENT_TIME_SECS: u32 = 300;

/// Alerts for the given state. Trace alerts come before the time alert.
pub fn derive_alerts(session: &Session) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if session.trace_level >= BURN_STATE_TRACE {
        alerts.push(Alert::BurnStateImminent);
    } else if session.trace_level >= HIGH_TRACE {
        alerts.push(Alert::HighTrace);
    }
    if session.time_remaining <= URGENT_TIME_SECS {
        alerts.push(Alert::UrgentTime);
    }
    alerts
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
