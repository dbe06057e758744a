//! Closed enumerations shared by sessions, scoring and the leaderboard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The agent role a team picks at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Hacker,
    Infiltrator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 2] = [AgentRole::Hacker, AgentRole::Infiltrator];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Hacker => "hacker",
            AgentRole::Infiltrator => "infiltrator",
        }
    }
}

impl Default for AgentRole {
    fn default() -> Self {
        AgentRole::Hacker
    }
}

/// Threat classification, set by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 4] = [
        ThreatLevel::Low,
        ThreatLevel::Moderate,
        ThreatLevel::High,
        ThreatLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Moderate => "MODERATE",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

/// Mission phases, in play order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MissionPhase {
    #[serde(rename = "PHASE_01_BEACHHEAD")]
    Beachhead,
    #[serde(rename = "PHASE_02_PENETRATION")]
    Penetration,
    #[serde(rename = "PHASE_03_EXTRACTION")]
    Extraction,
}

impl MissionPhase {
    pub const ALL: [MissionPhase; 3] = [
        MissionPhase::Beachhead,
        MissionPhase::Penetration,
        MissionPhase::Extraction,
    ];

    /// The phase every new session starts in.
    pub fn first() -> Self {
        MissionPhase::Beachhead
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MissionPhase::Beachhead => "PHASE_01_BEACHHEAD",
            MissionPhase::Penetration => "PHASE_02_PENETRATION",
            MissionPhase::Extraction => "PHASE_03_EXTRACTION",
        }
    }
}

/// Final rank tier of a completed mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MissionRank {
    #[serde(rename = "S-RANK")]
    S,
    #[serde(rename = "A-RANK")]
    A,
    #[serde(rename = "B-RANK")]
    B,
    #[serde(rename = "C-RANK")]
    C,
    #[serde(rename = "D-RANK")]
    D,
    #[serde(rename = "F-RANK")]
    F,
}

impl MissionRank {
    pub const ALL: [MissionRank; 6] = [
        MissionRank::S,
        MissionRank::A,
        MissionRank::B,
        MissionRank::C,
        MissionRank::D,
        MissionRank::F,
    ];

    /// Rank tier for a final score. Thresholds are inclusive lower bounds.
    pub fn from_score(score: f64) -> Self {
        if score >= 5000.0 {
            MissionRank::S
        } else if score >= 4000.0 {
            MissionRank::A
        } else if score >= 3000.0 {
            MissionRank::B
        } else if score >= 2000.0 {
            MissionRank::C
        } else if score >= 1000.0 {
            MissionRank::D
        } else {
            MissionRank::F
        }
    }

    /// Base hex-shard payout before the difficulty multiplier.
    pub fn base_hex_shards(&self) -> u32 {
        match self {
            MissionRank::S => 15,
            MissionRank::A => 22,
            MissionRank::B => 25,
            MissionRank::C => 13,
            MissionRank::D => 10,
            MissionRank::F => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MissionRank::S => "S-RANK",
            MissionRank::A => "A-RANK",
            MissionRank::B => "B-RANK",
            MissionRank::C => "C-RANK",
            MissionRank::D => "D-RANK",
            MissionRank::F => "F-RANK",
        }
    }
}

impl fmt::Display for MissionRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty chosen at session start. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DifficultyMode {
    Casual,
    Tactical,
    Hardened,
}

impl DifficultyMode {
    pub const ALL: [DifficultyMode; 3] = [
        DifficultyMode::Casual,
        DifficultyMode::Tactical,
        DifficultyMode::Hardened,
    ];

    /// Apply this difficulty's multiplier to a base shard count.
    pub fn scale_hex_shards(&self, base: u32) -> u32 {
        match self {
            DifficultyMode::Hardened => base * 2,
            // floor(base * 0.7) in integer arithmetic
            DifficultyMode::Casual => base * 7 / 10,
            DifficultyMode::Tactical => base,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyMode::Casual => "CASUAL",
            DifficultyMode::Tactical => "TACTICAL",
            DifficultyMode::Hardened => "HARDENED",
        }
    }
}

impl Default for DifficultyMode {
    fn default() -> Self {
        DifficultyMode::Tactical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod mission_rank {
        use super::*;

        #[test]
        fn thresholds_are_inclusive() {
            assert_eq!(MissionRank::from_score(5000.0), MissionRank::S);
            assert_eq!(MissionRank::from_score(4999.99), MissionRank::A);
            assert_eq!(MissionRank::from_score(4000.0), MissionRank::A);
            assert_eq!(MissionRank::from_score(3000.0), MissionRank::B);
            assert_eq!(MissionRank::from_score(2000.0), MissionRank::C);
            assert_eq!(MissionRank::from_score(1000.0), MissionRank::D);
            assert_eq!(MissionRank::from_score(999.0), MissionRank::F);
            assert_eq!(MissionRank::from_score(0.0), MissionRank::F);
        }

        #[test]
        fn rank_is_monotonic_in_score() {
            // ALL is ordered best to worst, so a higher score never maps to a later index.
            let tier = |score: f64| {
                let rank = MissionRank::from_score(score);
                MissionRank::ALL.iter().position(|r| *r == rank).unwrap()
            };
            let mut previous = tier(0.0);
            for step in 1..=700 {
                let current = tier(step as f64 * 10.0);
                assert!(current <= previous, "rank dropped at {}", step * 10);
                previous = current;
            }
        }

        #[test]
        fn serializes_with_rank_suffix() {
            assert_eq!(serde_json::to_string(&MissionRank::S).unwrap(), "\"S-RANK\"");
            let parsed: MissionRank = serde_json::from_str("\"F-RANK\"").unwrap();
            assert_eq!(parsed, MissionRank::F);
        }
    }

    mod difficulty {
        use super::*;

        #[test]
        fn hardened_doubles_and_casual_floors() {
            assert_eq!(DifficultyMode::Hardened.scale_hex_shards(15), 30);
            assert_eq!(DifficultyMode::Tactical.scale_hex_shards(15), 15);
            // 15 * 0.7 = 10.5
            assert_eq!(DifficultyMode::Casual.scale_hex_shards(15), 10);
            // 13 * 0.7 = 9.1
            assert_eq!(DifficultyMode::Casual.scale_hex_shards(13), 9);
        }

        #[test]
        fn parses_uppercase_names() {
            let parsed: DifficultyMode = serde_json::from_str("\"HARDENED\"").unwrap();
            assert_eq!(parsed, DifficultyMode::Hardened);
            assert!(serde_json::from_str::<DifficultyMode>("\"NIGHTMARE\"").is_err());
        }
    }

    #[test]
    fn phase_names_match_wire_format() {
        for phase in MissionPhase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
        }
        assert_eq!(MissionPhase::first(), MissionPhase::Beachhead);
    }

    #[test]
    fn role_and_threat_wire_names() {
        assert_eq!(serde_json::to_string(&AgentRole::Infiltrator).unwrap(), "\"infiltrator\"");
        assert_eq!(serde_json::to_string(&ThreatLevel::Moderate).unwrap(), "\"MODERATE\"");
    }
}
