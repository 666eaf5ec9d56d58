//! Run metrics for both execution modes.

use crate::model::{Process, ProcessState};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// DISCRETE MODE
// =============================================================================

/// Aggregate figures of a discrete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub processes: usize,
    pub resources: usize,
    pub steps_executed: u64,
    pub completed_processes: usize,
    pub deadlocks_detected: usize,
    /// Mean blocked steps over the processes that ever blocked (2 decimals)
    pub average_waiting_time: f64,
    /// Blocked process-steps over all process-steps, in percent (1 decimal)
    pub time_blocked_pct: f64,
}

/// Step-by-step counters of a discrete run.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    processes: usize,
    resources: usize,
    steps: u64,
    completed: usize,
    deadlocks: usize,
    blocked_steps: u64,
}

impl MetricsCollector {
    pub fn new(processes: usize, resources: usize) -> Self {
        Self {
            processes,
            resources,
            ..Self::default()
        }
    }

    /// Counts one executed step and charges a waiting step to every blocked
    /// process.
    pub fn record_step(&mut self, processes: &mut [Process]) {
        self.steps += 1;
        for process in processes.iter_mut().filter(|p| p.state == ProcessState::Blocked) {
            self.blocked_steps += 1;
            process.waiting_steps += 1;
        }
    }

    pub fn record_completion(&mut self) {
        self.completed += 1;
    }

    pub fn record_deadlock(&mut self) {
        self.deadlocks += 1;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn deadlocks(&self) -> usize {
        self.deadlocks
    }

    pub fn aggregate(&self, processes: &[Process]) -> AggregateMetrics {
        let waiting: Vec<u64> = processes
            .iter()
            .map(|p| p.waiting_steps)
            .filter(|&w| w > 0)
            .collect();
        let average_waiting_time = if waiting.is_empty() {
            0.0
        } else {
            waiting.iter().sum::<u64>() as f64 / waiting.len() as f64
        };
        let time_blocked_pct = if processes.is_empty() {
            0.0
        } else {
            self.blocked_steps as f64 / (self.steps.max(1) as f64 * processes.len() as f64) * 100.0
        };

        AggregateMetrics {
            processes: self.processes,
            resources: self.resources,
            steps_executed: self.steps,
            completed_processes: self.completed,
            deadlocks_detected: self.deadlocks,
            average_waiting_time: round_to(average_waiting_time, 2),
            time_blocked_pct: round_to(time_blocked_pct, 1),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// =============================================================================
// CONCURRENT MODE
// =============================================================================

/// Termination status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Ok => f.write_str("ok"),
            RunStatus::Error => f.write_str("error"),
        }
    }
}

/// Per-worker metrics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub name: String,
    pub status: RunStatus,
    pub retries: u32,
    /// Seconds from start to finish (none for terminated workers)
    pub duration: Option<f64>,
    /// Seconds spent blocked in acquisition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<f64>,
    /// Scenario label attached by the runner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

impl WorkerMetrics {
    pub fn ok(name: impl Into<String>, retries: u32, duration: f64, wait_time: f64) -> Self {
        Self {
            name: name.into(),
            status: RunStatus::Ok,
            retries,
            duration: Some(round_to(duration, 3)),
            wait_time: Some(round_to(wait_time, 3)),
            scenario: None,
        }
    }

    /// Record for a worker that gave up or was terminated.
    pub fn error(name: impl Into<String>, retries: u32) -> Self {
        Self {
            name: name.into(),
            status: RunStatus::Error,
            retries,
            duration: None,
            wait_time: None,
            scenario: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}

/// Averages over a set of worker records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub reported: usize,
    pub errors: usize,
    /// Expected workers that never reported
    pub missing: Vec<String>,
    pub average_retries: Option<f64>,
    pub average_duration: Option<f64>,
    pub average_wait_time: Option<f64>,
}

impl MetricsSummary {
    pub fn compute(metrics: &[WorkerMetrics], expected: &[String]) -> Self {
        let missing = expected
            .iter()
            .filter(|name| !metrics.iter().any(|m| &m.name == *name))
            .cloned()
            .collect();

        Self {
            reported: metrics.len(),
            errors: metrics.iter().filter(|m| !m.is_ok()).count(),
            missing,
            average_retries: average(metrics.iter().map(|m| Some(f64::from(m.retries)))),
            average_duration: average(metrics.iter().map(|m| m.duration)),
            average_wait_time: average(metrics.iter().map(|m| m.wait_time)),
        }
    }
}

fn average(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let valid: Vec<f64> = values.flatten().collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stalemate_env::{ProcessId, ResourceId};

    #[test]
    fn test_blocked_steps_and_averages() {
        let mut procs: Vec<Process> = (0..3)
            .map(|i| Process::new(ProcessId::new(i), vec![ResourceId::new(0)], 1))
            .collect();
        let mut collector = MetricsCollector::new(3, 1);

        procs[1].state = ProcessState::Blocked;
        collector.record_step(&mut procs);
        procs[2].state = ProcessState::Blocked;
        collector.record_step(&mut procs);
        collector.record_step(&mut procs);
        collector.record_completion();

        let agg = collector.aggregate(&procs);
        assert_eq!(agg.steps_executed, 3);
        assert_eq!(agg.completed_processes, 1);
        // P2 waited 3 steps, P3 waited 2
        assert_eq!(agg.average_waiting_time, 2.5);
        // 5 blocked of 9 process-steps
        assert_eq!(agg.time_blocked_pct, 55.6);
    }

    #[test]
    fn test_empty_run() {
        let collector = MetricsCollector::new(0, 0);
        let agg = collector.aggregate(&[]);
        assert_eq!(agg.average_waiting_time, 0.0);
        assert_eq!(agg.time_blocked_pct, 0.0);
    }

    #[test]
    fn test_worker_metrics_serialization() {
        let ok = WorkerMetrics::ok("P1", 2, 1.23456, 0.5);
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["duration"], 1.235);

        let err = WorkerMetrics::error("P2", 0);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["duration"].is_null());
        assert!(value.get("wait_time").is_none());
    }

    #[test]
    fn test_summary_lists_missing_workers() {
        let metrics = vec![WorkerMetrics::ok("P1", 1, 2.0, 1.0), WorkerMetrics::ok("P3", 3, 4.0, 0.0)];
        let expected = vec!["P1".to_string(), "P2".to_string(), "P3".to_string()];
        let summary = MetricsSummary::compute(&metrics, &expected);

        assert_eq!(summary.missing, vec!["P2".to_string()]);
        assert_eq!(summary.average_retries, Some(2.0));
        assert_eq!(summary.average_duration, Some(3.0));
        assert_eq!(summary.average_wait_time, Some(0.5));
        assert_eq!(summary.errors, 0);
    }
}
