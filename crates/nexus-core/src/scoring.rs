//! Mission scoring.
//!
//! Everything here is a pure function of its arguments. The completion time
//! is passed in rather than read from a clock, so identical inputs always
//! produce an identical [`PerformanceResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::mission::{DifficultyMode, MissionRank};
use crate::session::{Session, SessionKey};

/// Value used for any self-reported input the client leaves out.
pub const DEFAULT_PERFORMANCE_INPUT: f64 = 75.0;

const BASE_SCORE: f64 = 1000.0;
const TRACE_PENALTY_PER_POINT: f64 = 5.0;
const MISSED_OBJECTIVE_PENALTY: f64 = 100.0;
const SPEED_DEMON_SECS: i64 = 4500;

/// Self-reported performance numbers sent with a completion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInputs {
    #[serde(default)]
    pub technical_precision: Option<f64>,
    #[serde(default)]
    pub creative_adaptation: Option<f64>,
    #[serde(default)]
    pub operative_performance: Option<f64>,
}

impl PerformanceInputs {
    fn resolve(value: Option<f64>) -> f64 {
        match value {
            Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
            _ => DEFAULT_PERFORMANCE_INPUT,
        }
    }

    pub fn technical(&self) -> f64 {
        Self::resolve(self.technical_precision)
    }

    pub fn creative(&self) -> f64 {
        Self::resolve(self.creative_adaptation)
    }

    pub fn operational(&self) -> f64 {
        Self::resolve(self.operative_performance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Achievement {
    #[serde(rename = "Ghost Operator")]
    GhostOperator,
    #[serde(rename = "Elite Performance")]
    ElitePerformance,
    #[serde(rename = "Perfect Mission")]
    PerfectMission,
    #[serde(rename = "Speed Demon")]
    SpeedDemon,
}

/// Scoring output for one completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub session_id: SessionKey,
    pub technical_precision: f64,
    pub creative_adaptation: f64,
    pub operative_performance: f64,
    pub speed_efficiency: f64,
    /// Weighted 0..=100 blend of the four component scores.
    pub overall_score: f64,
    pub final_score: f64,
    pub final_rank: MissionRank,
    pub hex_shards_earned: u32,
    pub xp_earned: u64,
    pub achievements_unlocked: BTreeSet<Achievement>,
}

/// Multipliers and penalties behind a final score, exposed for tests and
/// debugging output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub time_efficiency: f64,
    pub speed_efficiency: f64,
    pub overall: f64,
    pub stealth_multiplier: f64,
    pub time_multiplier: f64,
    pub objectives_multiplier: f64,
    pub no_alarm_bonus: f64,
    pub perfect_bonus: f64,
    pub raw_score: f64,
    pub detection_penalty: f64,
    pub missed_objectives_penalty: f64,
    pub final_score: f64,
}

/// Scores sessions against a fixed objective count and mission clock.
#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    total_objectives: usize,
    time_budget: u32,
}

impl Scorer {
    pub fn new(total_objectives: usize, time_budget: u32) -> Self {
        Self {
            total_objectives,
            time_budget,
        }
    }

    pub fn breakdown(&self, session: &Session, inputs: &PerformanceInputs) -> ScoreBreakdown {
        let completed = session.completed_count(self.total_objectives);
        let all_done = completed == self.total_objectives;
        let trace = session.trace_level;

        let time_efficiency = if self.time_budget == 0 {
            0.0
        } else {
            percent(session.time_remaining as f64 / self.time_budget as f64 * 100.0)
        };
        let trace_efficiency = percent(100.0 - trace);
        let speed_efficiency = (time_efficiency + trace_efficiency) / 2.0;

        let overall = 0.4 * inputs.technical()
            + 0.3 * inputs.creative()
            + 0.2 * inputs.operational()
            + 0.1 * speed_efficiency;

        let objective_ratio = if self.total_objectives == 0 {
            0.0
        } else {
            completed as f64 / self.total_objectives as f64
        };

        let stealth_multiplier = 0.5 + (session.stealth_rating / 100.0) * 1.5;
        let time_multiplier = 1.0 + (time_efficiency / 100.0) * 0.5;
        let objectives_multiplier = 1.0 + objective_ratio;
        let no_alarm_bonus = if trace < 10.0 { 1.5 } else { 1.0 };
        let perfect_bonus = if trace == 0.0 && all_done { 2.0 } else { 1.0 };

        let raw_score = BASE_SCORE * overall / 100.0
            * stealth_multiplier
            * time_multiplier
            * objectives_multiplier
            * no_alarm_bonus
            * perfect_bonus;

        let detection_penalty = trace * TRACE_PENALTY_PER_POINT;
        let missed_objectives_penalty =
            (self.total_objectives - completed) as f64 * MISSED_OBJECTIVE_PENALTY;
        let final_score = (raw_score - detection_penalty - missed_objectives_penalty).max(0.0);

        ScoreBreakdown {
            time_efficiency,
            speed_efficiency,
            overall,
            stealth_multiplier,
            time_multiplier,
            objectives_multiplier,
            no_alarm_bonus,
            perfect_bonus,
            raw_score,
            detection_penalty,
            missed_objectives_penalty,
            final_score,
        }
    }

    /// Score a finished session. `finished_at` drives the Speed Demon check.
    pub fn score(
        &self,
        session: &Session,
        inputs: &PerformanceInputs,
        finished_at: DateTime<Utc>,
    ) -> PerformanceResult {
        let breakdown = self.breakdown(session, inputs);
        let completed = session.completed_count(self.total_objectives);
        let final_score = breakdown.final_score;
        let rank = MissionRank::from_score(final_score);

        PerformanceResult {
            session_id: session.session_id.clone(),
            technical_precision: inputs.technical(),
            creative_adaptation: inputs.creative(),
            operative_performance: inputs.operational(),
            speed_efficiency: breakdown.speed_efficiency,
            overall_score: breakdown.overall,
            final_score,
            final_rank: rank,
            hex_shards_earned: hex_shards(rank, session.difficulty_mode),
            xp_earned: experience(final_score, completed, session.trace_level),
            achievements_unlocked: self.achievements(session, final_score, finished_at),
        }
    }

    fn achievements(
        &self,
        session: &Session,
        final_score: f64,
        finished_at: DateTime<Utc>,
    ) -> BTreeSet<Achievement> {
        let mut unlocked = BTreeSet::new();
        if session.trace_level == 0.0 {
            unlocked.insert(Achievement::GhostOperator);
        }
        if final_score >= 5000.0 {
            unlocked.insert(Achievement::ElitePerformance);
        }
        if session.completed_count(self.total_objectives) == self.total_objectives {
            unlocked.insert(Achievement::PerfectMission);
        }
        let duration = finished_at.signed_duration_since(session.start_time);
        if duration.num_seconds() < SPEED_DEMON_SECS {
            unlocked.insert(Achievement::SpeedDemon);
        }
        unlocked
    }
}

pub fn hex_shards(rank: MissionRank, difficulty: DifficultyMode) -> u32 {
    difficulty.scale_hex_shards(rank.base_hex_shards())
}

pub fn experience(final_score: f64, completed: usize, trace_level: f64) -> u64 {
    let stealth_bonus = if trace_level == 0.0 {
        2000
    } else if trace_level < 20.0 {
        500
    } else {
        0
    };
    1000 + (final_score * 0.5).floor() as u64 + completed as u64 * 300 + stealth_bonus
}

fn percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
