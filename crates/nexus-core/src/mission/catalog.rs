//! Static table of mission objectives.

use serde::Serialize;

use super::types::{AgentRole, MissionPhase};

/// A single mission objective. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectiveDefinition {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub phase: MissionPhase,
    pub reward_progress: f64,
    pub reward_points: u32,
    /// Change applied to the threat meter when the objective completes.
    pub threat_penalty: f64,
    /// Seconds allotted to the objective.
    pub time_limit: u32,
    pub required_roles: Vec<AgentRole>,
}

/// Ordered, read-only collection of objective definitions.
#[derive(Debug, Clone)]
pub struct ObjectiveCatalog {
    objectives: Vec<ObjectiveDefinition>,
}

impl ObjectiveCatalog {
    /// Build a catalog from definitions, kept in id order.
    pub fn new(mut objectives: Vec<ObjectiveDefinition>) -> Self {
        objectives.sort_by_key(|o| o.id);
        objectives.dedup_by_key(|o| o.id);
        Self { objectives }
    }

    /// The nine-objective, three-phase heist.
    pub fn standard() -> Self {
        use AgentRole::{Hacker, Infiltrator};
        use MissionPhase::{Beachhead, Extraction, Penetration};

        let def = |id: u32,
                   name: &str,
                   description: &str,
                   phase: MissionPhase,
                   reward_progress: f64,
                   reward_points: u32,
                   threat_penalty: f64,
                   time_limit: u32,
                   required_roles: Vec<AgentRole>| ObjectiveDefinition {
            id,
            name: name.to_string(),
            description: description.to_string(),
            phase,
            reward_progress,
            reward_points,
            threat_penalty,
            time_limit,
            required_roles,
        };

        Self::new(vec![
            def(1, "Establish secure connection", "Connect to OmniCorp network", Beachhead, 15.0, 150, 0.0, 1800, vec![Hacker]),
            def(2, "Create false identity", "Generate fake credentials", Beachhead, 20.0, 200, -10.0, 1800, vec![Infiltrator]),
            def(3, "Map security systems", "Scan network topology", Beachhead, 15.0, 150, 0.0, 1800, vec![Hacker]),
            def(4, "Bypass biometric gateway", "Forge biometric data", Penetration, 25.0, 250, 0.0, 1680, vec![Infiltrator, Hacker]),
            def(5, "Escalate privileges", "Gain Tier-5 access", Penetration, 20.0, 200, 0.0, 1680, vec![Hacker]),
            def(6, "Disable alarm systems", "Deploy countermeasures", Penetration, 15.0, 150, -20.0, 1680, vec![Hacker]),
            def(7, "Locate Project Chimera", "Access vault database", Extraction, 20.0, 200, 0.0, 1800, vec![Hacker]),
            def(8, "Extract data fragments", "Download 5 fragments", Extraction, 30.0, 300, 0.0, 1800, vec![Hacker]),
            def(9, "Exfiltrate safely", "Clear traces and escape", Extraction, 20.0, 200, 0.0, 1800, vec![Infiltrator]),
        ])
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&ObjectiveDefinition> {
        self.objectives
            .binary_search_by_key(&id, |o| o.id)
            .ok()
            .map(|idx| &self.objectives[idx])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectiveDefinition> {
        self.objectives.iter()
    }

    pub fn in_phase(&self, phase: MissionPhase) -> impl Iterator<Item = &ObjectiveDefinition> {
        self.objectives.iter().filter(move |o| o.phase == phase)
    }
}

impl Default for ObjectiveCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
