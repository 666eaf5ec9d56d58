//! Scenario runner - executes a scenario in either execution mode.

use crate::error::ScenarioError;
use crate::scenarios::ScenarioId;
use crate::seeds::SeedSchedule;
use crate::world::{self, WorldConfig};
use clap::ValueEnum;
use stalemate_core::{
    ConcurrentDriver, ConcurrentReport, EventLog, Report, RunConfig, StepScheduler, StopReason,
};
use stalemate_env::TokioContext;
use std::fmt;
use tracing::{info, warn};

/// How a scenario is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Deterministic discrete steps with wait-for-graph detection
    Discrete,
    /// Real concurrent workers with liveness-timeout detection
    Concurrent,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Discrete => write!(f, "discrete"),
            ExecutionMode::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Report of one run, by mode.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Discrete { report: Report, stop: StopReason },
    Concurrent(ConcurrentReport),
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the policy's guarantee held
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    pub outcome: RunOutcome,
}

impl ScenarioResult {
    fn judge(scenario: ScenarioId, seed: u64, outcome: RunOutcome) -> Self {
        let failure_reason = if scenario.guarantees_progress() {
            match &outcome {
                RunOutcome::Discrete { report, .. } => report
                    .deadlock
                    .as_ref()
                    .map(|d| format!("deadlock at t={}: {}", d.t, d.cycle.join(" -> "))),
                RunOutcome::Concurrent(report) if !report.deadlocked.is_empty() => {
                    Some(format!("workers stuck past the deadline: {}", report.deadlocked.join(", ")))
                }
                RunOutcome::Concurrent(_) => None,
            }
        } else {
            None
        };
        Self {
            scenario,
            seed,
            passed: failure_reason.is_none(),
            failure_reason,
            outcome,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.outcome {
            RunOutcome::Discrete { .. } => ExecutionMode::Discrete,
            RunOutcome::Concurrent(_) => ExecutionMode::Concurrent,
        }
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    config: RunConfig,
    world: WorldConfig,
    virtual_time: bool,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(config: RunConfig, world: WorldConfig) -> Self {
        Self {
            config,
            world,
            virtual_time: false,
        }
    }

    /// Runs concurrent scenarios on a paused clock that jumps to the next
    /// timer whenever every worker is waiting.
    pub fn with_virtual_time(mut self, enabled: bool) -> Self {
        self.virtual_time = enabled;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn seeds(&self) -> SeedSchedule {
        SeedSchedule::new(self.config.seed)
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId, mode: ExecutionMode) -> Result<ScenarioResult, ScenarioError> {
        info!("Starting scenario: {} [{}] (seed={})", scenario.name(), mode, self.config.seed);

        let outcome = match mode {
            ExecutionMode::Discrete => {
                let (report, stop) = self.run_discrete(scenario)?;
                RunOutcome::Discrete { report, stop }
            }
            ExecutionMode::Concurrent => {
                let runtime = self.build_runtime()?;
                RunOutcome::Concurrent(runtime.block_on(self.run_concurrent(scenario))?)
            }
        };
        Ok(ScenarioResult::judge(scenario, self.config.seed, outcome))
    }

    /// Runs the discrete-step driver over the configured world.
    pub fn run_discrete(&self, scenario: ScenarioId) -> Result<(Report, StopReason), ScenarioError> {
        let world = self.world.build(&self.seeds());
        let log = EventLog::new();
        let mut scheduler = StepScheduler::new(
            scenario.policy(&self.config),
            world.resources,
            world.plans,
            &self.config,
            log.clone(),
        )?;

        let stop = scheduler.run();
        if let Err(e) = scheduler.allocation().check_invariants() {
            warn!("Allocation invariant broken after {} run: {}", scenario.name(), e);
        }
        info!("{} stopped: {:?}", scenario.name(), stop);
        Ok((scheduler.report(log.snapshot()), stop))
    }

    /// Runs the concurrent driver on the current runtime.
    pub async fn run_concurrent(&self, scenario: ScenarioId) -> Result<ConcurrentReport, ScenarioError> {
        let seeds = self.seeds();
        let shape = world::concurrent_scenario(
            scenario,
            scenario.policy(&self.config),
            self.config.workers,
            &seeds,
        );
        let ctx = TokioContext::shared(seeds.runtime());
        let driver = ConcurrentDriver::new(ctx, self.config.clone());
        let mut report = driver.run(shape).await?;
        for metrics in &mut report.metrics {
            metrics.scenario = Some(scenario.name().to_string());
        }
        Ok(report)
    }

    fn build_runtime(&self) -> std::io::Result<tokio::runtime::Runtime> {
        if self.virtual_time {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
        } else {
            tokio::runtime::Builder::new_multi_thread().enable_all().build()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_runner() -> ScenarioRunner {
        ScenarioRunner::new(RunConfig::default(), WorldConfig::demo())
    }

    #[test]
    fn test_naive_demo_deadlocks_but_passes() {
        let result = demo_runner().run(ScenarioId::Naive, ExecutionMode::Discrete).unwrap();
        assert!(result.passed);
        match result.outcome {
            RunOutcome::Discrete { report, stop } => {
                assert_eq!(stop, StopReason::Deadlock);
                assert_eq!(report.deadlock.unwrap().cycle, vec!["P1", "P2"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_ordered_demo_passes() {
        let result = demo_runner().run(ScenarioId::Ordered, ExecutionMode::Discrete).unwrap();
        assert!(result.passed);
        assert!(result.failure_reason.is_none());
        assert_eq!(result.mode(), ExecutionMode::Discrete);
    }

    #[test]
    fn test_empty_world_is_rejected() {
        let world = WorldConfig {
            processes: Some(0),
            ..WorldConfig::default()
        };
        let runner = ScenarioRunner::new(RunConfig::default(), world);
        assert!(matches!(
            runner.run(ScenarioId::Naive, ExecutionMode::Discrete),
            Err(ScenarioError::Model(_))
        ));
    }

    #[test]
    fn test_concurrent_ordered_on_virtual_time() {
        let runner = demo_runner().with_virtual_time(true);
        let result = runner.run(ScenarioId::Ordered, ExecutionMode::Concurrent).unwrap();
        assert!(result.passed);
        match result.outcome {
            RunOutcome::Concurrent(report) => {
                assert!(report.all_ok());
                assert!(report.metrics.iter().all(|m| m.scenario.as_deref() == Some("ordered")));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
