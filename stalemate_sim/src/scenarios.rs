//! Scenario catalogue: one scenario per acquisition policy.

use crate::error::ScenarioError;
use stalemate_core::{Policy, RunConfig};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Grant whenever free; reproduces a circular wait
    Naive,

    /// Global acquisition order (prevention)
    Ordered,

    /// Timeout plus randomized backoff (recovery)
    Retry,

    /// Grant only into safe states (avoidance)
    Banker,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Naive,
            ScenarioId::Ordered,
            ScenarioId::Retry,
            ScenarioId::Banker,
        ]
    }

    /// Parses a CLI selector: a scenario name, an alias, or `all`.
    pub fn select(selector: &str) -> Result<Vec<ScenarioId>, ScenarioError> {
        if selector.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        Ok(vec![selector.parse()?])
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Naive => "naive",
            ScenarioId::Ordered => "ordered",
            ScenarioId::Retry => "retry",
            ScenarioId::Banker => "banker",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Naive => "Reversed acquisition orders with no protection: expect a circular wait",
            ScenarioId::Ordered => "Every process acquires in global resource order: no cycle can form",
            ScenarioId::Retry => "Bounded waits, release and randomized backoff: cycles dissolve",
            ScenarioId::Banker => "Declared max claims; grants only into safe states",
        }
    }

    /// Returns true if the policy promises that no deadlock persists.
    pub fn guarantees_progress(&self) -> bool {
        !matches!(self, ScenarioId::Naive)
    }

    /// Builds the acquisition policy for this scenario.
    pub fn policy(&self, config: &RunConfig) -> Policy {
        match self {
            ScenarioId::Naive => Policy::Naive,
            ScenarioId::Ordered => Policy::Ordered,
            ScenarioId::Retry => Policy::Retry(config.retry_policy()),
            ScenarioId::Banker => Policy::Banker,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "naive" | "deadlock" => Ok(ScenarioId::Naive),
            "ordered" | "prevention" => Ok(ScenarioId::Ordered),
            "retry" | "recovery" => Ok(ScenarioId::Retry),
            "banker" | "avoidance" => Ok(ScenarioId::Banker),
            _ => Err(ScenarioError::UnknownScenario(s.to_string())),
        }
    }
}
