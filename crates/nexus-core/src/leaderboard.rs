//! Leaderboard over completed-session history.

use serde::Serialize;

use crate::mission::{AgentRole, DifficultyMode, MissionRank};
use crate::session::CompletedRecord;

pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub team_name: String,
    pub agent_role: AgentRole,
    pub final_score: f64,
    pub mission_rank: MissionRank,
    /// RFC 3339 completion timestamp.
    pub completion_time: String,
    pub stealth_rating: f64,
    pub trace_level: f64,
    pub difficulty_mode: DifficultyMode,
}

/// Rank `history` by final score, highest first.
///
/// Records outside `difficulty` are dropped before ranking. Equal scores
/// keep their history order.
pub fn rank(
    history: &[CompletedRecord],
    limit: usize,
    difficulty: Option<DifficultyMode>,
) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&CompletedRecord> = history
        .iter()
        .filter(|record| difficulty.map_or(true, |d| record.session.difficulty_mode == d))
        .collect();
    // sort_by is stable; total_cmp keeps NaN from panicking or reordering ties.
    ranked.sort_by(|a, b| b.performance.final_score.total_cmp(&a.performance.final_score));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, record)| LeaderboardEntry {
            rank: index + 1,
            team_name: record.session.team_name.clone(),
            agent_role: record.session.selected_agent,
            final_score: record.performance.final_score,
            mission_rank: record.performance.final_rank,
            completion_time: record.completed_at.to_rfc3339(),
            stealth_rating: record.session.stealth_rating,
            trace_level: record.session.trace_level,
            difficulty_mode: record.session.difficulty_mode,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{PerformanceInputs, Scorer};
    use crate::session::{Session, SessionKey, SessionStart};
    use chrono::{Duration, TimeZone, Utc};

    fn record(team: &str, score: f64, difficulty: DifficultyMode) -> CompletedRecord {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let session = Session::new(
            SessionStart {
                key: SessionKey::new(team),
                team_name: team.to_string(),
                role: AgentRole::Hacker,
                agent_color: "#FFFFFF".to_string(),
                difficulty,
            },
            5280,
            now,
        );
        let mut performance = Scorer::new(9, 5280).score(&session, &PerformanceInputs::default(), now);
        performance.final_score = score;
        performance.final_rank = MissionRank::from_score(score);
        CompletedRecord {
            session,
            performance,
            completed_at: now + Duration::seconds(3600),
        }
    }

    fn teams(entries: &[LeaderboardEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.team_name.as_str()).collect()
    }

    #[test]
    fn sorted_by_score_descending() {
        let history = vec![
            record("low", 900.0, DifficultyMode::Tactical),
            record("high", 6000.0, DifficultyMode::Tactical),
            record("mid", 3100.0, DifficultyMode::Casual),
        ];
        let board = rank(&history, DEFAULT_LIMIT, None);

        assert_eq!(teams(&board), vec!["high", "mid", "low"]);
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(board[0].mission_rank, MissionRank::S);
        assert_eq!(board[2].mission_rank, MissionRank::F);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let history = vec![
            record("first", 2000.0, DifficultyMode::Tactical),
            record("second", 2000.0, DifficultyMode::Tactical),
            record("third", 2000.0, DifficultyMode::Tactical),
        ];
        assert_eq!(teams(&rank(&history, 10, None)), vec!["first", "second", "third"]);
    }

    #[test]
    fn limit_caps_entries() {
        let history: Vec<_> = (0..20)
            .map(|n| record(&format!("t{n}"), n as f64 * 100.0, DifficultyMode::Tactical))
            .collect();
        let board = rank(&history, 5, None);
        assert_eq!(board.len(), 5);
        assert_eq!(board[0].team_name, "t19");
        assert!(board.windows(2).all(|w| w[0].final_score >= w[1].final_score));
        assert!(rank(&history, 0, None).is_empty());
    }

    #[test]
    fn difficulty_filter_excludes_other_modes() {
        let history = vec![
            record("casual", 5000.0, DifficultyMode::Casual),
            record("hard-1", 1000.0, DifficultyMode::Hardened),
            record("tactical", 4000.0, DifficultyMode::Tactical),
            record("hard-2", 3000.0, DifficultyMode::Hardened),
        ];
        let board = rank(&history, 10, Some(DifficultyMode::Hardened));
        assert_eq!(teams(&board), vec!["hard-2", "hard-1"]);
        assert!(board.iter().all(|e| e.difficulty_mode == DifficultyMode::Hardened));
        assert_eq!(board[0].rank, 1);
    }

    #[test]
    fn entry_carries_completion_timestamp() {
        let history = vec![record("a", 100.0, DifficultyMode::Tactical)];
        let board = rank(&history, 1, None);
        assert!(board[0].completion_time.starts_with("2026-03-01T13:00:00"));
    }
}
