//! Stalemate Simulation Harness
//!
//! Builds worlds for the four acquisition policies and runs them through
//! either driver of `stalemate_core`:
//! - **Discrete**: deterministic steps, wait-for-graph detection, per-step
//!   state tables
//! - **Concurrent**: one tokio task per worker, liveness-timeout detection,
//!   per-worker telemetry
//!
//! Every random draw (plans, banker claims, backoffs) derives from one
//! master seed, so a run is reproduced from its seed number alone.
//!
//! # Usage
//!
//! ```ignore
//! use stalemate_sim::{ExecutionMode, ScenarioRunner, WorldConfig};
//! use stalemate_sim::scenarios::ScenarioId;
//! use stalemate_core::RunConfig;
//!
//! let runner = ScenarioRunner::new(RunConfig::default(), WorldConfig::demo());
//! let result = runner.run(ScenarioId::Naive, ExecutionMode::Discrete)?;
//! ```

pub mod error;
pub mod exporter;
pub mod render;
pub mod runner;
pub mod scenarios;
mod seeds;
mod world;

pub use error::{ExportError, ScenarioError};
pub use exporter::MetricsFormat;
pub use runner::{ExecutionMode, RunOutcome, ScenarioResult, ScenarioRunner};
pub use seeds::SeedSchedule;
pub use world::{concurrent_scenario, ContentionPreset, DiscreteWorld, WorldConfig};
