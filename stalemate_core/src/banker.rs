//! Banker's algorithm: safety check and gated grants.
//!
//! A state is *safe* when some ordering lets every process obtain its full
//! remaining need and finish. The check is rerun from scratch for every
//! candidate grant; nothing is cached between calls.
//!
//! ```text
//! work   = available
//! finish = [false; n]
//! loop:
//!     find first p (list order) with !finish[p] && need[p] <= work
//!     none -> break
//!     work += allocation[p]; finish[p] = true   (restart scan)
//! safe = all(finish)
//! ```

use crate::allocation::{AllocationSnapshot, AllocationState};
use crate::error::ModelError;
use crate::policy::DenyReason;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use stalemate_env::ProcessId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Returns the order in which processes can finish, or `None` if the state
/// is unsafe.
///
/// Ties are broken by list order: after every success the scan restarts at
/// the first unfinished process.
pub fn safe_sequence(
    allocation: &DMatrix<i64>,
    available: &DVector<i64>,
    max_claim: &DMatrix<i64>,
) -> Option<Vec<ProcessId>> {
    let processes = allocation.nrows();
    let resources = allocation.ncols();
    let mut work = available.clone();
    let mut finish = vec![false; processes];
    let mut order = Vec::with_capacity(processes);

    loop {
        let candidate = (0..processes).find(|&p| {
            !finish[p] && (0..resources).all(|r| max_claim[(p, r)] - allocation[(p, r)] <= work[r])
        });
        let Some(p) = candidate else { break };

        for r in 0..resources {
            work[r] += allocation[(p, r)];
        }
        finish[p] = true;
        order.push(ProcessId::new(p));
    }

    if order.len() == processes {
        Some(order)
    } else {
        None
    }
}

/// Safety check over explicit matrices.
pub fn is_safe(allocation: &DMatrix<i64>, available: &DVector<i64>, max_claim: &DMatrix<i64>) -> bool {
    safe_sequence(allocation, available, max_claim).is_some()
}

/// Safety check over the current state.
pub fn is_state_safe(alloc: &AllocationState) -> bool {
    is_safe(alloc.allocation(), alloc.available(), alloc.max_claim())
}

/// Decides whether `request` may be granted to `pid`, without mutating.
///
/// Checks run in a fixed order and the first failure wins:
/// 1. `Invalid` - wrong dimensionality, negative amount or unknown process
/// 2. `ExceedsNeed` - more than the remaining declared need
/// 3. `Unavailable` - more than is currently free
/// 4. `Unsafe` - the hypothetical state admits no safe sequence
pub fn evaluate(alloc: &AllocationState, pid: ProcessId, request: &[i64]) -> Result<(), DenyReason> {
    evaluate_capacity(alloc, pid, request)?;

    let mut allocation = alloc.allocation().clone();
    let mut available = alloc.available().clone();
    for (r, &amount) in request.iter().enumerate() {
        available[r] -= amount;
        allocation[(pid.index(), r)] += amount;
    }
    if !is_safe(&allocation, &available, alloc.max_claim()) {
        return Err(DenyReason::Unsafe);
    }

    Ok(())
}

/// The first three checks of [`evaluate`], without the safety check.
pub fn evaluate_capacity(alloc: &AllocationState, pid: ProcessId, request: &[i64]) -> Result<(), DenyReason> {
    if pid.index() >= alloc.num_processes()
        || request.len() != alloc.num_resources()
        || request.iter().any(|&amount| amount < 0)
    {
        return Err(DenyReason::Invalid);
    }

    let need = alloc.need_of(pid);
    if request.iter().zip(&need).any(|(req, need)| req > need) {
        return Err(DenyReason::ExceedsNeed);
    }

    if request.iter().zip(alloc.available().iter()).any(|(req, avail)| req > avail) {
        return Err(DenyReason::Unavailable);
    }

    Ok(())
}

/// Evaluates and, if allowed, commits `request`.
///
/// A denial leaves `alloc` untouched.
pub fn request(alloc: &mut AllocationState, pid: ProcessId, request: &[i64]) -> Result<(), DenyReason> {
    evaluate(alloc, pid, request)?;
    alloc.commit(pid, request);
    Ok(())
}

/// Draws a partial request against the remaining need.
///
/// Each positive entry becomes a uniform amount in `[1, need]`; entries with
/// nothing left stay zero.
pub fn partial_request<R: Rng + ?Sized>(rng: &mut R, remaining: &[i64]) -> Vec<i64> {
    remaining
        .iter()
        .map(|&need| if need > 0 { rng.gen_range(1..=need) } else { 0 })
        .collect()
}

// =============================================================================
// SHARED BANKER
// =============================================================================

/// Mutex-guarded allocation state for concurrent workers.
///
/// Only atomic operations are exposed: evaluation and commit of a request
/// happen in one critical section, so no two workers interleave their
/// safety checks.
#[derive(Debug, Clone)]
pub struct SharedBanker {
    state: Arc<Mutex<AllocationState>>,
}

impl SharedBanker {
    pub fn new(state: AllocationState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Builds a banker over countable resources with explicit claim rows.
    pub fn with_claims(
        resources: Vec<crate::model::Resource>,
        claims: &[Vec<i64>],
    ) -> Result<Self, ModelError> {
        AllocationState::from_claims(resources, claims).map(Self::new)
    }

    fn lock(&self) -> MutexGuard<'_, AllocationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate-then-commit under one lock.
    pub fn request(&self, pid: ProcessId, amounts: &[i64]) -> Result<(), DenyReason> {
        request(&mut self.lock(), pid, amounts)
    }

    /// Returns every unit `pid` holds to the pool.
    pub fn release_all(&self, pid: ProcessId) -> Vec<i64> {
        self.lock().release_all(pid)
    }

    pub fn snapshot(&self) -> AllocationSnapshot {
        self.lock().snapshot()
    }

    pub fn check_invariants(&self) -> Result<(), ModelError> {
        self.lock().check_invariants()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Resource;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use stalemate_env::ResourceId;

    fn typed(capacities: &[i64]) -> Vec<Resource> {
        capacities
            .iter()
            .enumerate()
            .map(|(i, &c)| Resource::countable(ResourceId::new(i), format!("T{}", i + 1), c))
            .collect()
    }

    /// Classic textbook state: 5 processes over (10, 5, 7).
    fn textbook() -> AllocationState {
        let claims = vec![
            vec![7, 5, 3],
            vec![3, 2, 2],
            vec![9, 0, 2],
            vec![2, 2, 2],
            vec![4, 3, 3],
        ];
        let held = vec![
            vec![0, 1, 0],
            vec![2, 0, 0],
            vec![3, 0, 2],
            vec![2, 1, 1],
            vec![0, 0, 2],
        ];
        let mut alloc = AllocationState::from_claims(typed(&[10, 5, 7]), &claims).unwrap();
        for (p, row) in held.iter().enumerate() {
            alloc.commit(ProcessId::new(p), row);
        }
        alloc
    }

    #[test]
    fn test_textbook_state_is_safe() {
        let alloc = textbook();
        assert_eq!(alloc.available().as_slice(), &[3, 3, 2]);

        let order = safe_sequence(alloc.allocation(), alloc.available(), alloc.max_claim()).unwrap();
        let ids: Vec<usize> = order.iter().map(|p| p.index()).collect();
        // Restarting the scan after every success favours earlier processes
        assert_eq!(ids, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn test_distinct_denial_reasons() {
        let alloc = textbook();
        let p1 = ProcessId::new(1);

        assert_eq!(evaluate(&alloc, p1, &[1, 0]), Err(DenyReason::Invalid));
        assert_eq!(evaluate(&alloc, p1, &[-1, 0, 0]), Err(DenyReason::Invalid));
        assert_eq!(evaluate(&alloc, ProcessId::new(9), &[0, 0, 0]), Err(DenyReason::Invalid));
        assert_eq!(evaluate(&alloc, p1, &[2, 0, 0]), Err(DenyReason::ExceedsNeed));
        assert_eq!(evaluate(&alloc, ProcessId::new(2), &[4, 0, 0]), Err(DenyReason::Unavailable));
        assert_eq!(evaluate(&alloc, p1, &[1, 0, 2]), Ok(()));
    }

    #[test]
    fn test_unsafe_grant_is_denied_without_mutation() {
        let mut alloc = textbook();
        assert!(request(&mut alloc, ProcessId::new(1), &[1, 0, 2]).is_ok());

        // P0 asking (0, 2, 0) now leaves (2, 1, 0) from which nobody can finish
        let before = alloc.snapshot();
        assert_eq!(request(&mut alloc, ProcessId::new(0), &[0, 2, 0]), Err(DenyReason::Unsafe));
        assert_eq!(alloc.snapshot(), before);
    }

    #[test]
    fn test_two_process_unit_cycle_is_avoided() {
        let resources = vec![
            Resource::unit(ResourceId::new(0), "R1"),
            Resource::unit(ResourceId::new(1), "R2"),
        ];
        let mut alloc = AllocationState::from_claims(resources, &[vec![1, 1], vec![1, 1]]).unwrap();

        assert!(request(&mut alloc, ProcessId::new(0), &[1, 0]).is_ok());
        // Granting R2 to P2 would let each hold what the other needs
        assert_eq!(request(&mut alloc, ProcessId::new(1), &[0, 1]), Err(DenyReason::Unsafe));
    }

    #[test]
    fn test_partial_request_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..64 {
            let req = partial_request(&mut rng, &[2, 0, 1]);
            assert!((1..=2).contains(&req[0]));
            assert_eq!(req[1], 0);
            assert_eq!(req[2], 1);
        }
        assert_eq!(partial_request(&mut rng, &[0, 0]), vec![0, 0]);
    }

    #[test]
    fn test_shared_banker_negotiation_completes() {
        let banker = SharedBanker::with_claims(typed(&[2, 2]), &[vec![2, 1], vec![1, 2], vec![2, 2]]).unwrap();
        let mut remaining = vec![vec![2, 1], vec![1, 2], vec![2, 2]];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut done = vec![false; 3];

        for _ in 0..200 {
            for p in 0..3 {
                if done[p] {
                    continue;
                }
                let pid = ProcessId::new(p);
                let req = partial_request(&mut rng, &remaining[p]);
                if banker.request(pid, &req).is_ok() {
                    for (need, amount) in remaining[p].iter_mut().zip(&req) {
                        *need -= amount;
                    }
                    if remaining[p].iter().all(|&n| n == 0) {
                        banker.release_all(pid);
                        done[p] = true;
                    }
                }
                assert!(banker.check_invariants().is_ok());
            }
            if done.iter().all(|&d| d) {
                break;
            }
        }

        assert!(done.iter().all(|&d| d));
        assert_eq!(banker.snapshot().available, vec![2, 2]);
    }

    proptest! {
        /// Every reachable state keeps conservation, and every grant leaves a
        /// safe state while every denial has a reason that re-checks.
        #[test]
        fn prop_banker_soundness(
            claims in proptest::collection::vec(proptest::collection::vec(0i64..=3, 2), 1..5),
            requests in proptest::collection::vec((0usize..5, 0i64..=3, 0i64..=3), 0..40),
        ) {
            let mut alloc = AllocationState::from_claims(typed(&[3, 3]), &claims).unwrap();
            let n = claims.len();

            for (p, a, b) in requests {
                let pid = ProcessId::new(p % n);
                let req = [a, b];
                let outcome = request(&mut alloc, pid, &req);
                prop_assert!(alloc.check_invariants().is_ok());

                match outcome {
                    Ok(()) => prop_assert!(is_state_safe(&alloc)),
                    Err(DenyReason::Unsafe) => {
                        let mut hypothetical = alloc.clone();
                        hypothetical.commit(pid, &req);
                        prop_assert!(!is_state_safe(&hypothetical));
                    }
                    Err(DenyReason::Unavailable) => {
                        prop_assert!(req.iter().zip(alloc.available().iter()).any(|(r, a)| r > a));
                    }
                    Err(DenyReason::ExceedsNeed) => {
                        let need = alloc.need_of(pid);
                        prop_assert!(req.iter().zip(&need).any(|(r, n)| r > n));
                    }
                    Err(other) => prop_assert!(false, "unexpected denial {:?}", other),
                }

                // Occasionally finish a process to keep the run moving
                if alloc.need_of(pid).iter().all(|&n| n == 0) {
                    alloc.release_all(pid);
                }
            }
        }
    }
}
