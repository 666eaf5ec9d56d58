//! Machine-readable run reports.

use crate::allocation::AllocationState;
use crate::detector::Detection;
use crate::events::Event;
use crate::metrics::{AggregateMetrics, WorkerMetrics};
use crate::model::{PendingRequest, Process, ProcessState};
use serde::{Deserialize, Serialize};

/// One process row of a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: String,
    pub held: Vec<String>,
    pub requested: Option<String>,
    pub state: ProcessState,
}

/// State of every process after one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub t: u64,
    pub processes: Vec<ProcessSnapshot>,
}

impl StateSnapshot {
    pub fn capture(t: u64, processes: &[Process], alloc: &AllocationState) -> Self {
        let rows = processes
            .iter()
            .map(|p| ProcessSnapshot {
                pid: p.id.to_string(),
                held: alloc
                    .held_by(p.id)
                    .into_iter()
                    .map(|r| alloc.resource_name(r))
                    .collect(),
                requested: p.current_request.as_ref().map(|req| match req {
                    PendingRequest::Unit(r) => alloc.resource_name(*r),
                    PendingRequest::Vector(amounts) => format!("{:?}", amounts),
                }),
                state: p.state,
            })
            .collect();
        Self { t, processes: rows }
    }
}

/// Deadlock witness: wait-for edges and the cycle found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockInfo {
    pub t: u64,
    pub edges: Vec<[String; 2]>,
    pub cycle: Vec<String>,
}

impl DeadlockInfo {
    /// Returns `None` when the detection found no cycle.
    pub fn from_detection(t: u64, detection: &Detection) -> Option<Self> {
        let cycle = detection.cycle.as_ref()?;
        Some(Self {
            t,
            edges: detection
                .edges
                .iter()
                .map(|(from, to)| [from.to_string(), to.to_string()])
                .collect(),
            cycle: cycle.iter().map(|p| p.to_string()).collect(),
        })
    }
}

/// Report of a discrete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub mode: String,
    pub metrics: AggregateMetrics,
    pub events: Vec<Event>,
    pub state_history: Vec<StateSnapshot>,
    pub deadlock: Option<DeadlockInfo>,
}

impl Report {
    /// True when every process finished.
    pub fn all_finished(&self) -> bool {
        self.metrics.completed_processes == self.metrics.processes
    }
}

/// A resource left owned by a terminated worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakedResource {
    pub resource: String,
    pub holder: String,
}

/// Report of a concurrent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrentReport {
    pub mode: String,
    /// Wall (or virtual) seconds for the whole run
    pub duration: f64,
    pub metrics: Vec<WorkerMetrics>,
    /// Workers that never published telemetry
    pub missing: Vec<String>,
    /// Workers still alive after the liveness deadline
    pub deadlocked: Vec<String>,
    pub leaked: Vec<LeakedResource>,
    pub telemetry_lost: bool,
    pub events: Vec<Event>,
}

impl ConcurrentReport {
    pub fn all_ok(&self) -> bool {
        self.deadlocked.is_empty() && self.metrics.iter().all(WorkerMetrics::is_ok)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&WorkerMetrics> {
        self.metrics.iter().find(|m| m.name == name)
    }
}
