//! Discrete-step driver.
//!
//! Deterministic and single-threaded: "blocked" is a state field, never a
//! host-level wait. Within a step processes are evaluated in list order,
//! which decides who wins a race for a free resource.
//!
//! # Step Structure
//!
//! ```text
//! for each non-terminal process (list order):
//!     backing off         -> count down
//!     holding a grant     -> count down
//!     blocked on request  -> retry it (retry policy: count, maybe time out)
//!     holds whole plan    -> complete and release
//!     otherwise           -> request next resource of the plan
//! complete anyone now holding their whole plan
//! record metrics, snapshot state, run the detector
//! ```

use crate::allocation::AllocationState;
use crate::banker;
use crate::config::RunConfig;
use crate::detector::{self, Detection};
use crate::error::ModelError;
use crate::events::{Event, EventKind, EventSink};
use crate::metrics::MetricsCollector;
use crate::model::{Process, ProcessState, Resource};
use crate::policy::{self, Policy, RequestOutcome};
use crate::report::{DeadlockInfo, Report, StateSnapshot};
use serde_json::json;
use stalemate_env::{ProcessId, ResourceId};

/// Why a discrete run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A wait-for cycle was found (not in retry mode)
    Deadlock,
    /// Every process finished
    AllFinished,
    /// `max_steps` ran out
    BudgetExhausted,
}

/// Discrete-step scheduler over one scenario.
pub struct StepScheduler<S: EventSink> {
    policy: Policy,
    processes: Vec<Process>,
    alloc: AllocationState,
    metrics: MetricsCollector,
    sink: S,
    max_steps: u64,
    hold_steps: u32,
    state_history: Vec<StateSnapshot>,
    deadlock: Option<DeadlockInfo>,
}

impl<S: EventSink> StepScheduler<S> {
    /// Creates a scheduler whose claims are the processes' plans.
    ///
    /// Process `i` gets plan `plans[i]` and an RNG derived from
    /// `config.seed` and `i`.
    pub fn new(
        policy: Policy,
        resources: Vec<Resource>,
        plans: Vec<Vec<ResourceId>>,
        config: &RunConfig,
        sink: S,
    ) -> Result<Self, ModelError> {
        let alloc = AllocationState::from_plans(resources, &plans)?;
        let processes = plans
            .into_iter()
            .enumerate()
            .map(|(i, plan)| Process::new(ProcessId::new(i), plan, config.seed))
            .collect();
        Ok(Self::from_parts(policy, processes, alloc, config, sink))
    }

    /// Creates a scheduler over prepared processes and allocation state.
    pub fn from_parts(
        policy: Policy,
        processes: Vec<Process>,
        alloc: AllocationState,
        config: &RunConfig,
        sink: S,
    ) -> Self {
        let metrics = MetricsCollector::new(processes.len(), alloc.num_resources());
        Self {
            policy,
            processes,
            alloc,
            metrics,
            sink,
            max_steps: config.max_steps,
            hold_steps: config.hold_steps,
            state_history: Vec::new(),
            deadlock: None,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn allocation(&self) -> &AllocationState {
        &self.alloc
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn deadlock(&self) -> Option<&DeadlockInfo> {
        self.deadlock.as_ref()
    }

    pub fn state_history(&self) -> &[StateSnapshot] {
        &self.state_history
    }

    /// Runs until deadlock, completion or the step budget.
    pub fn run(&mut self) -> StopReason {
        let mode = self.policy.name();
        self.sink.emit(
            Event::new(
                0,
                EventKind::Start,
                format!(
                    "Running simulation with {} processes and {} resources in mode '{}'",
                    self.processes.len(),
                    self.alloc.num_resources(),
                    mode
                ),
            )
            .with_data(json!({ "mode": mode })),
        );

        for t in 0..self.max_steps {
            let deadlocked = self.step(t);
            self.metrics.record_step(&mut self.processes);
            if deadlocked {
                return StopReason::Deadlock;
            }
            if self.processes.iter().all(|p| p.state == ProcessState::Finished) {
                self.sink.emit(Event::new(
                    t,
                    EventKind::Finish,
                    format!("All processes finished by t={}", t),
                ));
                return StopReason::AllFinished;
            }
        }

        self.sink.emit(Event::new(
            self.max_steps,
            EventKind::Info,
            format!("Step budget of {} exhausted", self.max_steps),
        ));
        StopReason::BudgetExhausted
    }

    /// Executes step `t`. Returns true if a deadlock stopped the run.
    pub fn step(&mut self, t: u64) -> bool {
        let ordered = self.policy.is_ordered();
        let retry = self.policy.retry().copied();
        let hold_steps = self.hold_steps;
        let Self {
            policy,
            processes,
            alloc,
            metrics,
            sink,
            ..
        } = self;

        for process in processes.iter_mut() {
            if process.state.is_terminal() {
                continue;
            }
            if process.backoff_remaining > 0 {
                process.backoff_remaining -= 1;
                continue;
            }
            process.start(t);
            if process.hold_remaining > 0 {
                process.hold_remaining -= 1;
                continue;
            }

            if process.state == ProcessState::Blocked && process.current_request.is_some() {
                let outcome = policy.retry_pending(alloc, process, t, &*sink);
                match outcome {
                    Some(RequestOutcome::Granted) => process.hold_remaining = hold_steps,
                    Some(RequestOutcome::Denied(_)) => {
                        if let Some(retry) = retry {
                            process.attempt_wait += 1;
                            if process.attempt_wait >= retry.timeout_steps {
                                time_out(process, alloc, sink, retry.backoff_steps, t);
                                if retry.exhausted(process.retries) {
                                    give_up(process, sink, t);
                                }
                            }
                        }
                    }
                    _ => {}
                }
                continue;
            }

            if process.has_all_resources(alloc) {
                complete(process, alloc, metrics, sink, t);
                continue;
            }

            if let Some(target) = process.next_request(alloc, ordered) {
                if policy.request(alloc, process, target, t, &*sink) == RequestOutcome::Granted {
                    process.hold_remaining = hold_steps;
                }
            }
        }

        for process in processes.iter_mut() {
            if process.state == ProcessState::Running
                && process.hold_remaining == 0
                && process.has_all_resources(alloc)
            {
                complete(process, alloc, metrics, sink, t);
            }
        }

        let detection = detector::detect(processes, alloc);
        self.state_history
            .push(StateSnapshot::capture(t, &self.processes, &self.alloc));
        self.handle_detection(t, &detection)
    }

    fn handle_detection(&mut self, t: u64, detection: &Detection) -> bool {
        let Some(info) = DeadlockInfo::from_detection(t, detection) else {
            return false;
        };

        // Retry mode resolves circular waits by timing out. Under the banker
        // an unsafe denial can go stale once a holder completes later in the
        // step, so a cycle over a safe state is only a wait for availability.
        let transient = self.policy.retry().is_some()
            || (matches!(self.policy, Policy::Banker) && banker::is_state_safe(&self.alloc));
        if transient {
            self.sink.emit(
                Event::new(
                    t,
                    EventKind::Info,
                    format!("[t={}] transient circular wait: {}", t, info.cycle.join(" -> ")),
                )
                .with_data(json!({ "cycle": info.cycle })),
            );
            return false;
        }

        self.metrics.record_deadlock();
        let data = serde_json::to_value(&info).unwrap_or_default();
        self.sink.emit(
            Event::new(t, EventKind::Deadlock, format!("*** Deadlock detected at t={} ***", t)).with_data(data),
        );
        if let Some(cycle) = &detection.cycle {
            for pid in cycle {
                if let Some(process) = self.processes.get_mut(pid.index()) {
                    process.mark_deadlocked();
                }
            }
        }
        self.deadlock = Some(info);
        true
    }

    /// Builds the report from the collected events.
    pub fn report(&self, events: Vec<Event>) -> Report {
        Report {
            mode: self.policy.name().to_string(),
            metrics: self.metrics.aggregate(&self.processes),
            events,
            state_history: self.state_history.clone(),
            deadlock: self.deadlock.clone(),
        }
    }
}

fn complete<S: EventSink>(
    process: &mut Process,
    alloc: &mut AllocationState,
    metrics: &mut MetricsCollector,
    sink: &S,
    t: u64,
) {
    let held: Vec<String> = alloc
        .held_by(process.id)
        .into_iter()
        .map(|r| alloc.resource_name(r))
        .collect();
    sink.emit(
        Event::new(
            t,
            EventKind::Complete,
            format!("[t={}] {} completed its work; releasing resources", t, process.id),
        )
        .with_data(json!({ "pid": process.id.to_string(), "held": held })),
    );
    policy::release_all(alloc, process, t, sink);
    alloc.retire(process.id);
    process.finish(t);
    metrics.record_completion();
}

/// Abandons the current attempt: release, draw a backoff, restart later.
fn time_out<S: EventSink>(process: &mut Process, alloc: &mut AllocationState, sink: &S, backoff_steps: u32, t: u64) {
    policy::release_all(alloc, process, t, sink);
    let backoff = process.draw_backoff(backoff_steps);
    process.back_off(backoff);
    sink.emit(
        Event::new(
            t,
            EventKind::Info,
            format!(
                "[t={}] {} timed out; backing off {} steps (retry {})",
                t, process.id, backoff, process.retries
            ),
        )
        .with_data(json!({
            "pid": process.id.to_string(),
            "backoff": backoff,
            "retries": process.retries,
        })),
    );
}

fn give_up<S: EventSink>(process: &mut Process, sink: &S, t: u64) {
    process.mark_deadlocked();
    sink.emit(Event::new(
        t,
        EventKind::Info,
        format!("[t={}] {} exceeded its retry ceiling after {} retries", t, process.id, process.retries),
    ));
}
