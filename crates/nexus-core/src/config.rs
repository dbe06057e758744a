//! Fixed engine constants, supplied once at startup.

use std::time::Duration;

/// Full mission clock: 88 minutes.
pub const MISSION_TIME_BUDGET_SECS: u32 = 5280;

/// Sessions idle longer than this are reaped.
pub const INACTIVITY_THRESHOLD: Duration = Duration::from_secs(600);

pub const ANALYTICS_INTERVAL: Duration = Duration::from_secs(30);
pub const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Read-only engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Seconds on the clock when a session starts.
    pub mission_time_budget: u32,
    pub inactivity_threshold: Duration,
    pub analytics_interval: Duration,
    pub reaper_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mission_time_budget: MISSION_TIME_BUDGET_SECS,
            inactivity_threshold: INACTIVITY_THRESHOLD,
            analytics_interval: ANALYTICS_INTERVAL,
            reaper_interval: REAPER_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_mission_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.mission_time_budget, 5280);
        assert_eq!(config.inactivity_threshold.as_secs(), 600);
        assert_eq!(config.analytics_interval.as_secs(), 30);
        assert_eq!(config.reaper_interval.as_secs(), 60);
    }
}
