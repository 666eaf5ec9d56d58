//! Resource & process model shared by both execution modes.

use crate::allocation::AllocationState;
use crate::policy::DenyReason;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use stalemate_env::{derive_seed, ProcessId, ResourceId};
use std::fmt;

// =============================================================================
// RESOURCE
// =============================================================================

/// An exclusive (unit) or countable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier; its ordinal is the global acquisition order
    pub id: ResourceId,
    /// Display name (`R1`, `A2`, `B` ...)
    pub name: String,
    /// Units in existence (1 = single owner)
    pub capacity: i64,
}

impl Resource {
    /// Creates a unit resource held by at most one process.
    pub fn unit(id: ResourceId, name: impl Into<String>) -> Self {
        Self::countable(id, name, 1)
    }

    /// Creates a resource with `capacity` interchangeable units.
    pub fn countable(id: ResourceId, name: impl Into<String>, capacity: i64) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
        }
    }
}

// =============================================================================
// PROCESS
// =============================================================================

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
    Deadlocked,
    Finished,
}

impl ProcessState {
    /// Terminal states accept no further work.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Deadlocked | ProcessState::Finished)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Deadlocked => "DEADLOCKED",
            ProcessState::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request a blocked process is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    /// One unit of a single resource
    Unit(ResourceId),
    /// A vector over all resource types (banker negotiation)
    Vector(Vec<i64>),
}

/// A competing process.
///
/// Holdings live in [`AllocationState`]; the process only carries its plan,
/// its lifecycle and the per-process counters the drivers need.
#[derive(Debug, Clone)]
pub struct Process {
    /// Identifier (ordinal = evaluation order)
    pub id: ProcessId,
    /// Resources in the order the process intends to acquire them
    pub plan: Vec<ResourceId>,
    /// Lifecycle state
    pub state: ProcessState,
    /// Outstanding request while blocked
    pub current_request: Option<PendingRequest>,
    /// Why the outstanding request was last denied
    pub last_denial: Option<DenyReason>,
    /// Attempts abandoned after a timeout or denial
    pub retries: u32,
    /// Total steps spent blocked
    pub waiting_steps: u64,
    /// Consecutive blocked steps in the current attempt
    pub attempt_wait: u32,
    /// Steps left holding the latest grant before moving on
    pub hold_remaining: u32,
    /// Steps left sleeping after abandoning an attempt
    pub backoff_remaining: u32,
    /// Step of the first scheduling
    pub started_at: Option<u64>,
    /// Step of completion
    pub finished_at: Option<u64>,
    rng: ChaCha8Rng,
}

impl Process {
    /// Creates a process with a plan and an RNG seeded from `run_seed` and
    /// the process ordinal.
    pub fn new(id: ProcessId, plan: Vec<ResourceId>, run_seed: u64) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(derive_seed(run_seed, id.index() as u64));
        Self::with_rng(id, plan, rng)
    }

    /// Creates a process with an explicit random source.
    pub fn with_rng(id: ProcessId, plan: Vec<ResourceId>, rng: ChaCha8Rng) -> Self {
        Self {
            id,
            plan,
            state: ProcessState::Ready,
            current_request: None,
            last_denial: None,
            retries: 0,
            waiting_steps: 0,
            attempt_wait: 0,
            hold_remaining: 0,
            backoff_remaining: 0,
            started_at: None,
            finished_at: None,
            rng,
        }
    }

    /// Records the first scheduling step.
    ///
    /// Returns true the first time only.
    pub fn start(&mut self, t: u64) -> bool {
        if self.state == ProcessState::Ready {
            self.state = ProcessState::Running;
        }
        if self.started_at.is_none() {
            self.started_at = Some(t);
            return true;
        }
        false
    }

    /// Moves to `Running` and forgets any outstanding request.
    pub fn mark_running(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = ProcessState::Running;
        self.current_request = None;
        self.last_denial = None;
        self.attempt_wait = 0;
    }

    /// Moves to `Blocked` and records what the process waits on.
    pub fn mark_blocked(&mut self, request: PendingRequest, reason: DenyReason) {
        if self.state.is_terminal() {
            return;
        }
        self.state = ProcessState::Blocked;
        self.current_request = Some(request);
        self.last_denial = Some(reason);
    }

    /// Moves to `Deadlocked`; terminal.
    pub fn mark_deadlocked(&mut self) {
        if self.state == ProcessState::Finished {
            return;
        }
        self.state = ProcessState::Deadlocked;
    }

    /// Drops the current attempt and sleeps for `backoff` steps.
    pub fn back_off(&mut self, backoff: u32) {
        self.state = ProcessState::Ready;
        self.current_request = None;
        self.last_denial = None;
        self.attempt_wait = 0;
        self.hold_remaining = 0;
        self.backoff_remaining = backoff;
        self.retries += 1;
    }

    /// Marks completion at step `t`. Holdings are released by the caller.
    pub fn finish(&mut self, t: u64) {
        self.state = ProcessState::Finished;
        self.current_request = None;
        self.last_denial = None;
        self.finished_at = Some(t);
    }

    /// Returns true once every planned resource is held.
    pub fn has_all_resources(&self, alloc: &AllocationState) -> bool {
        self.plan.iter().all(|&r| alloc.held(self.id, r) > 0)
    }

    /// Next planned resource not yet held.
    ///
    /// In ordered mode the lowest-ordered one is chosen regardless of the
    /// plan's own order, so a higher resource is never held while waiting
    /// on a lower one.
    pub fn next_request(&self, alloc: &AllocationState, ordered: bool) -> Option<ResourceId> {
        let mut missing = self.plan.iter().copied().filter(|&r| alloc.held(self.id, r) == 0);
        if ordered {
            missing.min()
        } else {
            missing.next()
        }
    }

    /// Draws a backoff uniformly in `[hold / 2, hold]`, at least one step.
    pub fn draw_backoff(&mut self, hold: u32) -> u32 {
        let high = hold.max(1);
        let low = (hold / 2).max(1);
        self.rng.gen_range(low..=high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(plan: &[usize]) -> Process {
        Process::new(
            ProcessId::new(0),
            plan.iter().map(|&r| ResourceId::new(r)).collect(),
            42,
        )
    }

    #[test]
    fn test_state_transitions() {
        let mut p = process(&[0, 1]);
        assert_eq!(p.state, ProcessState::Ready);

        assert!(p.start(0));
        assert!(!p.start(1));
        assert_eq!(p.state, ProcessState::Running);
        assert_eq!(p.started_at, Some(0));

        p.mark_blocked(PendingRequest::Unit(ResourceId::new(1)), DenyReason::Unavailable);
        assert_eq!(p.state, ProcessState::Blocked);
        assert_eq!(p.current_request, Some(PendingRequest::Unit(ResourceId::new(1))));

        p.mark_deadlocked();
        assert_eq!(p.state, ProcessState::Deadlocked);

        // Terminal: no further work accepted
        p.mark_running();
        assert_eq!(p.state, ProcessState::Deadlocked);
    }

    #[test]
    fn test_finished_is_not_deadlocked() {
        let mut p = process(&[0]);
        p.finish(3);
        p.mark_deadlocked();
        assert_eq!(p.state, ProcessState::Finished);
        assert_eq!(p.finished_at, Some(3));
    }

    #[test]
    fn test_back_off_counts_retry() {
        let mut p = process(&[0, 1]);
        p.start(0);
        p.mark_blocked(PendingRequest::Unit(ResourceId::new(1)), DenyReason::Unavailable);
        p.attempt_wait = 3;

        p.back_off(2);
        assert_eq!(p.state, ProcessState::Ready);
        assert_eq!(p.retries, 1);
        assert_eq!(p.backoff_remaining, 2);
        assert!(p.current_request.is_none());
        assert_eq!(p.attempt_wait, 0);
    }

    #[test]
    fn test_backoff_range_and_determinism() {
        let mut a = process(&[0]);
        let mut b = process(&[0]);
        for _ in 0..32 {
            let x = a.draw_backoff(6);
            assert!((3..=6).contains(&x));
            assert_eq!(x, b.draw_backoff(6));
        }
        assert_eq!(a.draw_backoff(0), 1);
    }
}
