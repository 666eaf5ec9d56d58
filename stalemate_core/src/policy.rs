//! Acquisition policies.
//!
//! A policy is a tagged value dispatched through one [`Policy::request`]
//! function. Every variant shares the same skeleton:
//!
//! 1. Malformed requests (unknown resource, out of order, beyond the declared
//!    claim) fail closed and leave all state untouched.
//! 2. Already-held resources are an idempotent success.
//! 3. The grant decision: free capacity (naive, ordered, retry) or the
//!    banker's safety check (banker).
//! 4. Grant commits and marks the process `Running`; any other denial marks
//!    it `Blocked` on the request.
//!
//! Timeouts and backoff for the retry policy are driven by the scheduler;
//! the grant decision itself is the naive one.

use crate::allocation::AllocationState;
use crate::banker;
use crate::events::{Event, EventKind, EventSink};
use crate::model::{PendingRequest, Process};
use serde::{Deserialize, Serialize};
use serde_json::json;
use stalemate_env::{ProcessId, ResourceId};
use std::fmt;

/// Why a request was not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Wrong dimensionality, negative amount or unknown id
    Invalid,
    /// More than the remaining declared need
    ExceedsNeed,
    /// More than is currently free
    Unavailable,
    /// Grant would leave no safe sequence
    Unsafe,
    /// Violates the global acquisition order
    OutOfOrder,
}

impl DenyReason {
    /// Malformed requests are programming errors in a plan and are never
    /// retried.
    pub fn is_malformed(self) -> bool {
        matches!(self, DenyReason::Invalid | DenyReason::ExceedsNeed | DenyReason::OutOfOrder)
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenyReason::Invalid => "invalid request",
            DenyReason::ExceedsNeed => "exceeds declared need",
            DenyReason::Unavailable => "exceeds availability",
            DenyReason::Unsafe => "unsafe",
            DenyReason::OutOfOrder => "out of order",
        };
        f.write_str(text)
    }
}

/// Result of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Units were committed
    Granted,
    /// Nothing to do, the process already holds the resource
    AlreadyHeld,
    Denied(DenyReason),
}

impl RequestOutcome {
    pub fn is_granted(self) -> bool {
        !matches!(self, RequestOutcome::Denied(_))
    }

    pub fn denial(self) -> Option<DenyReason> {
        match self {
            RequestOutcome::Denied(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Timeout and backoff parameters for the retry policy (discrete steps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Blocked steps tolerated before the attempt is abandoned
    pub timeout_steps: u32,
    /// Upper bound of the randomized backoff (drawn in `[b/2, b]`, at least 1)
    pub backoff_steps: u32,
    /// Abandoned attempts allowed before the process gives up
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_steps: 2,
            backoff_steps: 4,
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// Returns true once `retries` has used up the ceiling.
    pub fn exhausted(&self, retries: u32) -> bool {
        self.max_retries.is_some_and(|max| retries > max)
    }
}

/// Resource-acquisition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Grant whenever free; circular waits are possible
    Naive,
    /// Grant only in global resource order (prevention)
    Ordered,
    /// Naive grants plus timeout and randomized backoff (recovery)
    Retry(RetryPolicy),
    /// Grant only into safe states (avoidance)
    Banker,
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::Naive => "naive",
            Policy::Ordered => "ordered",
            Policy::Retry(_) => "retry",
            Policy::Banker => "banker",
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Policy::Ordered)
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        match self {
            Policy::Retry(retry) => Some(retry),
            _ => None,
        }
    }

    /// Requests one unit of `resource` for `process` at time `t`.
    pub fn request(
        &self,
        alloc: &mut AllocationState,
        process: &mut Process,
        resource: ResourceId,
        t: u64,
        sink: &dyn EventSink,
    ) -> RequestOutcome {
        let pid = process.id;
        if resource.index() >= alloc.num_resources() || pid.index() >= alloc.num_processes() {
            return self.reject(process, &resource.to_string(), DenyReason::Invalid, t, sink);
        }
        let name = alloc.resource_name(resource);

        if alloc.held(pid, resource) > 0 {
            process.mark_running();
            return RequestOutcome::AlreadyHeld;
        }

        if self.is_ordered() && alloc.held_by(pid).iter().any(|held| held.index() >= resource.index()) {
            return self.reject(process, &name, DenyReason::OutOfOrder, t, sink);
        }

        let unit = alloc.unit_request(resource);
        let decision = match self {
            Policy::Banker => banker::evaluate(alloc, pid, &unit),
            _ => banker::evaluate_capacity(alloc, pid, &unit),
        };

        match decision {
            Ok(()) => {
                alloc.commit(pid, &unit);
                process.mark_running();
                let banker_safe = matches!(self, Policy::Banker);
                let suffix = if banker_safe { " (Banker's safe)" } else { "" };
                sink.emit(
                    Event::new(t, EventKind::Acquire, format!("[t={}] {} acquired {}{}", t, pid, name, suffix))
                        .with_data(acquire_payload(pid, &name, banker_safe)),
                );
                RequestOutcome::Granted
            }
            Err(reason) if reason.is_malformed() => self.reject(process, &name, reason, t, sink),
            Err(reason) => {
                process.mark_blocked(PendingRequest::Unit(resource), reason);
                let holders: Vec<String> = alloc.holders(resource).iter().map(|p| p.to_string()).collect();
                let message = if reason == DenyReason::Unsafe {
                    format!(
                        "[t={}] {} requested {} but grant is unsafe by Banker's algorithm; BLOCKED",
                        t, pid, name
                    )
                } else {
                    format!(
                        "[t={}] {} requested {} but it is held by {}; BLOCKED",
                        t,
                        pid,
                        name,
                        holders.join(", ")
                    )
                };
                sink.emit(Event::new(t, EventKind::Blocked, message).with_data(json!({
                    "pid": pid.to_string(),
                    "resource": name,
                    "held_by": holders,
                    "reason": reason.to_string(),
                })));
                RequestOutcome::Denied(reason)
            }
        }
    }

    /// Requests an amount vector over every resource type.
    ///
    /// An all-zero request is a trivially granted no-op.
    pub fn request_vector(
        &self,
        alloc: &mut AllocationState,
        process: &mut Process,
        amounts: &[i64],
        t: u64,
        sink: &dyn EventSink,
    ) -> RequestOutcome {
        let pid = process.id;
        let label = format!("{:?}", amounts);
        if amounts.iter().all(|&a| a == 0) && amounts.len() == alloc.num_resources() {
            process.mark_running();
            return RequestOutcome::AlreadyHeld;
        }

        let decision = match self {
            Policy::Banker => banker::evaluate(alloc, pid, amounts),
            _ => banker::evaluate_capacity(alloc, pid, amounts),
        };

        match decision {
            Ok(()) => {
                alloc.commit(pid, amounts);
                process.mark_running();
                sink.emit(
                    Event::new(t, EventKind::Acquire, format!("[t={}] {} granted {}", t, pid, label)).with_data(
                        json!({
                            "pid": pid.to_string(),
                            "request": amounts,
                            "available": alloc.available().as_slice(),
                        }),
                    ),
                );
                RequestOutcome::Granted
            }
            Err(reason) if reason.is_malformed() => self.reject(process, &label, reason, t, sink),
            Err(reason) => {
                process.mark_blocked(PendingRequest::Vector(amounts.to_vec()), reason);
                sink.emit(
                    Event::new(
                        t,
                        EventKind::Blocked,
                        format!("[t={}] {} request {} denied ({}); BLOCKED", t, pid, label, reason),
                    )
                    .with_data(json!({
                        "pid": pid.to_string(),
                        "request": amounts,
                        "reason": reason.to_string(),
                    })),
                );
                RequestOutcome::Denied(reason)
            }
        }
    }

    /// Re-issues a blocked process's outstanding request.
    pub fn retry_pending(
        &self,
        alloc: &mut AllocationState,
        process: &mut Process,
        t: u64,
        sink: &dyn EventSink,
    ) -> Option<RequestOutcome> {
        match process.current_request.clone()? {
            PendingRequest::Unit(resource) => Some(self.request(alloc, process, resource, t, sink)),
            PendingRequest::Vector(amounts) => Some(self.request_vector(alloc, process, &amounts, t, sink)),
        }
    }

    /// Malformed request: no state change, an info event and a warning.
    fn reject(
        &self,
        process: &Process,
        what: &str,
        reason: DenyReason,
        t: u64,
        sink: &dyn EventSink,
    ) -> RequestOutcome {
        tracing::warn!(pid = %process.id, policy = self.name(), "rejected request for {}: {}", what, reason);
        sink.emit(
            Event::new(
                t,
                EventKind::Info,
                format!("[t={}] {} request for {} rejected: {}", t, process.id, what, reason),
            )
            .with_data(json!({
                "pid": process.id.to_string(),
                "request": what,
                "reason": reason.to_string(),
            })),
        );
        RequestOutcome::Denied(reason)
    }
}

/// Releases everything `process` holds and emits a release event.
///
/// Returns the names of the released resources in global order.
pub fn release_all(alloc: &mut AllocationState, process: &Process, t: u64, sink: &dyn EventSink) -> Vec<String> {
    let names: Vec<String> = alloc
        .held_by(process.id)
        .into_iter()
        .map(|r| alloc.resource_name(r))
        .collect();
    alloc.release_all(process.id);
    if !names.is_empty() {
        sink.emit(
            Event::new(
                t,
                EventKind::Release,
                format!("[t={}] {} releasing {}", t, process.id, names.join(", ")),
            )
            .with_data(json!({ "pid": process.id.to_string(), "resources": names })),
        );
    }
    names
}

fn acquire_payload(pid: ProcessId, resource: &str, banker_safe: bool) -> serde_json::Value {
    if banker_safe {
        json!({ "pid": pid.to_string(), "resource": resource, "banker_safe": true })
    } else {
        json!({ "pid": pid.to_string(), "resource": resource })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use crate::model::{ProcessState, Resource};

    fn setup(plans: &[&[usize]]) -> (AllocationState, Vec<Process>) {
        let width = plans.iter().flat_map(|p| p.iter()).max().map_or(1, |m| m + 1);
        let resources = (0..width)
            .map(|i| Resource::unit(ResourceId::new(i), format!("R{}", i + 1)))
            .collect();
        let plans: Vec<Vec<ResourceId>> = plans
            .iter()
            .map(|p| p.iter().map(|&r| ResourceId::new(r)).collect())
            .collect();
        let alloc = AllocationState::from_plans(resources, &plans).unwrap();
        let processes = plans
            .into_iter()
            .enumerate()
            .map(|(i, plan)| Process::new(ProcessId::new(i), plan, 42))
            .collect();
        (alloc, processes)
    }

    #[test]
    fn test_naive_grants_then_blocks() {
        let (mut alloc, mut procs) = setup(&[&[0, 1], &[1, 0]]);
        let log = EventLog::new();
        let r1 = ResourceId::new(0);

        let outcome = Policy::Naive.request(&mut alloc, &mut procs[0], r1, 0, &log);
        assert_eq!(outcome, RequestOutcome::Granted);
        assert_eq!(procs[0].state, ProcessState::Running);

        let outcome = Policy::Naive.request(&mut alloc, &mut procs[1], r1, 0, &log);
        assert_eq!(outcome, RequestOutcome::Denied(DenyReason::Unavailable));
        assert!(!outcome.is_granted());
        assert_eq!(procs[1].state, ProcessState::Blocked);
        assert_eq!(procs[1].current_request, Some(PendingRequest::Unit(r1)));

        let blocked = log.of_kind(EventKind::Blocked);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].data.as_ref().unwrap()["held_by"][0], "P1");
    }

    #[test]
    fn test_already_held_is_idempotent() {
        let (mut alloc, mut procs) = setup(&[&[0]]);
        let log = EventLog::new();
        let r1 = ResourceId::new(0);

        assert!(Policy::Naive.request(&mut alloc, &mut procs[0], r1, 0, &log).is_granted());
        let before = alloc.snapshot();
        let events_before = log.len();

        let outcome = Policy::Naive.request(&mut alloc, &mut procs[0], r1, 1, &log);
        assert_eq!(outcome, RequestOutcome::AlreadyHeld);
        assert!(outcome.is_granted());
        assert_eq!(alloc.snapshot(), before);
        assert_eq!(log.len(), events_before);
    }

    #[test]
    fn test_ordered_rejects_out_of_order_without_blocking() {
        let (mut alloc, mut procs) = setup(&[&[0, 1]]);
        let log = EventLog::new();

        assert!(Policy::Ordered
            .request(&mut alloc, &mut procs[0], ResourceId::new(1), 0, &log)
            .is_granted());
        let before = alloc.snapshot();

        let outcome = Policy::Ordered.request(&mut alloc, &mut procs[0], ResourceId::new(0), 1, &log);
        assert_eq!(outcome, RequestOutcome::Denied(DenyReason::OutOfOrder));
        assert_eq!(procs[0].state, ProcessState::Running);
        assert!(procs[0].current_request.is_none());
        assert_eq!(alloc.snapshot(), before);
        assert_eq!(log.of_kind(EventKind::Info).len(), 1);
    }

    #[test]
    fn test_request_outside_plan_exceeds_need() {
        let (mut alloc, mut procs) = setup(&[&[0], &[1]]);
        let log = EventLog::new();

        let outcome = Policy::Naive.request(&mut alloc, &mut procs[0], ResourceId::new(1), 0, &log);
        assert_eq!(outcome, RequestOutcome::Denied(DenyReason::ExceedsNeed));
        assert_ne!(procs[0].state, ProcessState::Blocked);

        let outcome = Policy::Naive.request(&mut alloc, &mut procs[0], ResourceId::new(7), 0, &log);
        assert_eq!(outcome, RequestOutcome::Denied(DenyReason::Invalid));
    }

    #[test]
    fn test_banker_blocks_unsafe_unit_grant() {
        let (mut alloc, mut procs) = setup(&[&[0, 1], &[1, 0]]);
        let log = EventLog::new();

        assert!(Policy::Banker
            .request(&mut alloc, &mut procs[0], ResourceId::new(0), 0, &log)
            .is_granted());
        let outcome = Policy::Banker.request(&mut alloc, &mut procs[1], ResourceId::new(1), 0, &log);
        assert_eq!(outcome, RequestOutcome::Denied(DenyReason::Unsafe));
        assert_eq!(procs[1].last_denial, Some(DenyReason::Unsafe));
        assert_eq!(alloc.available().as_slice(), &[0, 1]);

        let acquire = log.of_kind(EventKind::Acquire);
        assert_eq!(acquire[0].data.as_ref().unwrap()["banker_safe"], true);
    }

    #[test]
    fn test_vector_request_and_pending_retry() {
        let resources = vec![
            Resource::countable(ResourceId::new(0), "A", 2),
            Resource::countable(ResourceId::new(1), "B", 2),
        ];
        let mut alloc = AllocationState::from_claims(resources, &[vec![2, 1], vec![1, 2]]).unwrap();
        let mut p1 = Process::new(ProcessId::new(0), Vec::new(), 1);
        let mut p2 = Process::new(ProcessId::new(1), Vec::new(), 1);
        let log = EventLog::new();

        assert!(Policy::Banker.request_vector(&mut alloc, &mut p1, &[2, 0], 0, &log).is_granted());
        let outcome = Policy::Banker.request_vector(&mut alloc, &mut p2, &[1, 0], 0, &log);
        assert_eq!(outcome, RequestOutcome::Denied(DenyReason::Unavailable));
        assert_eq!(p2.current_request, Some(PendingRequest::Vector(vec![1, 0])));

        release_all(&mut alloc, &p1, 1, &log);
        let retried = Policy::Banker.retry_pending(&mut alloc, &mut p2, 2, &log);
        assert_eq!(retried, Some(RequestOutcome::Granted));
        assert!(p2.current_request.is_none());
        assert!(alloc.check_invariants().is_ok());
    }

    #[test]
    fn test_release_all_emits_names() {
        let (mut alloc, mut procs) = setup(&[&[0, 1]]);
        let log = EventLog::new();
        Policy::Naive.request(&mut alloc, &mut procs[0], ResourceId::new(1), 0, &log);
        Policy::Naive.request(&mut alloc, &mut procs[0], ResourceId::new(0), 1, &log);

        let released = release_all(&mut alloc, &procs[0], 2, &log);
        assert_eq!(released, vec!["R1".to_string(), "R2".to_string()]);
        assert_eq!(alloc.available().as_slice(), &[1, 1]);
        assert_eq!(log.of_kind(EventKind::Release).len(), 1);
    }

    #[test]
    fn test_retry_ceiling() {
        let retry = RetryPolicy {
            max_retries: Some(2),
            ..RetryPolicy::default()
        };
        assert!(!retry.exhausted(2));
        assert!(retry.exhausted(3));
        assert!(!RetryPolicy::default().exhausted(u32::MAX));
    }
}
