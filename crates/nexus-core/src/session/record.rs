//! Completed-session history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::Session;
use crate::scoring::PerformanceResult;

/// Final snapshot plus its score. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub session: Session,
    pub performance: PerformanceResult,
    pub completed_at: DateTime<Utc>,
}

/// Where a key currently lives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionStatus {
    Active { data: Session },
    Completed { performance: PerformanceResult },
}
