//! Error types for the simulation harness.

use stalemate_core::ModelError;
use thiserror::Error;

/// Errors raised while selecting, building or running a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Selector matched no scenario or alias
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// World shape rejected by the model
    #[error("Invalid world: {0}")]
    Model(#[from] ModelError),

    /// Async runtime could not be built
    #[error("Runtime unavailable: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Errors raised while persisting reports and metrics.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
