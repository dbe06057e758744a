//! Mission vocabulary: the closed enums and the objective catalog.

mod catalog;
mod types;

pub use catalog::{ObjectiveCatalog, ObjectiveDefinition};
pub use types::{AgentRole, DifficultyMode, MissionPhase, MissionRank, ThreatLevel};
