//! Allocation state: who holds how much of what.
//!
//! The single source of truth for holdings in both execution modes. Stored
//! as dense matrices indexed `[(process, resource)]`:
//!
//! ```text
//! available  : DVector  (resources not yet allocated, per type)
//! allocation : DMatrix  (process x resource -> amount held)
//! max_claim  : DMatrix  (declared upper bound per process per type)
//! need       = max_claim - allocation
//! ```
//!
//! Mutation happens only through [`AllocationState::commit`] and
//! [`AllocationState::release_all`], which callers reach through a policy
//! (discrete mode) or a mutex-guarded banker (concurrent mode).

use crate::error::ModelError;
use crate::model::Resource;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use stalemate_env::{ProcessId, ResourceId};

/// Plain copy of the matrices for logs and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    pub available: Vec<i64>,
    pub allocation: Vec<Vec<i64>>,
    pub max_claim: Vec<Vec<i64>>,
}

/// Holdings of every process over every resource.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationState {
    resources: Vec<Resource>,
    total: DVector<i64>,
    available: DVector<i64>,
    allocation: DMatrix<i64>,
    max_claim: DMatrix<i64>,
}

impl AllocationState {
    /// Creates an empty allocation over `resources` with explicit claims.
    ///
    /// `max_claim` has one row per process and one column per resource.
    ///
    /// # Errors
    /// - `NoResources` / `NoProcesses` for empty inputs
    /// - `DimensionMismatch` if a resource id is not its list position or the
    ///   claim matrix has the wrong width
    /// - `ZeroCapacity` for resources with capacity below one
    /// - `ClaimExceedsCapacity` for claims that could never be met
    pub fn new(resources: Vec<Resource>, max_claim: DMatrix<i64>) -> Result<Self, ModelError> {
        if resources.is_empty() {
            return Err(ModelError::NoResources);
        }
        if max_claim.nrows() == 0 {
            return Err(ModelError::NoProcesses);
        }
        if max_claim.ncols() != resources.len() {
            return Err(ModelError::DimensionMismatch {
                expected: resources.len(),
                actual: max_claim.ncols(),
            });
        }

        for (idx, resource) in resources.iter().enumerate() {
            if resource.id.index() != idx {
                return Err(ModelError::DimensionMismatch {
                    expected: idx,
                    actual: resource.id.index(),
                });
            }
            if resource.capacity < 1 {
                return Err(ModelError::ZeroCapacity(resource.name.clone()));
            }
            for p in 0..max_claim.nrows() {
                let claim = max_claim[(p, idx)];
                if claim < 0 || claim > resource.capacity {
                    return Err(ModelError::ClaimExceedsCapacity {
                        process: ProcessId::new(p).to_string(),
                        resource: resource.name.clone(),
                        claim,
                        capacity: resource.capacity,
                    });
                }
            }
        }

        let total = DVector::from_iterator(resources.len(), resources.iter().map(|r| r.capacity));
        let allocation = DMatrix::zeros(max_claim.nrows(), resources.len());

        Ok(Self {
            resources,
            available: total.clone(),
            total,
            allocation,
            max_claim,
        })
    }

    /// Creates an allocation whose claims are one unit of each planned
    /// resource.
    pub fn from_plans(resources: Vec<Resource>, plans: &[Vec<ResourceId>]) -> Result<Self, ModelError> {
        let width = resources.len();
        let mut claims = DMatrix::zeros(plans.len(), width);
        for (p, plan) in plans.iter().enumerate() {
            for &r in plan {
                if r.index() >= width {
                    return Err(ModelError::UnknownResource(r.to_string()));
                }
                claims[(p, r.index())] = 1;
            }
        }
        Self::new(resources, claims)
    }

    /// Creates an allocation from claim rows.
    pub fn from_claims(resources: Vec<Resource>, claims: &[Vec<i64>]) -> Result<Self, ModelError> {
        let width = resources.len();
        if let Some(row) = claims.iter().find(|row| row.len() != width) {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        let matrix = DMatrix::from_fn(claims.len(), width, |p, r| claims[p][r]);
        Self::new(resources, matrix)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.index())
    }

    /// Display name of a resource, or its id if unknown.
    pub fn resource_name(&self, id: ResourceId) -> String {
        self.resource(id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn num_processes(&self) -> usize {
        self.allocation.nrows()
    }

    pub fn num_resources(&self) -> usize {
        self.resources.len()
    }

    pub fn available(&self) -> &DVector<i64> {
        &self.available
    }

    pub fn allocation(&self) -> &DMatrix<i64> {
        &self.allocation
    }

    pub fn max_claim(&self) -> &DMatrix<i64> {
        &self.max_claim
    }

    /// Remaining need of one process.
    pub fn need_of(&self, pid: ProcessId) -> Vec<i64> {
        (0..self.num_resources())
            .map(|r| self.max_claim[(pid.index(), r)] - self.allocation[(pid.index(), r)])
            .collect()
    }

    /// Amount of `resource` held by `pid` (0 for unknown ids).
    pub fn held(&self, pid: ProcessId, resource: ResourceId) -> i64 {
        if pid.index() >= self.num_processes() || resource.index() >= self.num_resources() {
            return 0;
        }
        self.allocation[(pid.index(), resource.index())]
    }

    /// Resources of which `pid` holds at least one unit, in global order.
    pub fn held_by(&self, pid: ProcessId) -> Vec<ResourceId> {
        (0..self.num_resources())
            .filter(|&r| self.allocation[(pid.index(), r)] > 0)
            .map(ResourceId::new)
            .collect()
    }

    /// Processes holding at least one unit of `resource`, in list order.
    pub fn holders(&self, resource: ResourceId) -> Vec<ProcessId> {
        if resource.index() >= self.num_resources() {
            return Vec::new();
        }
        (0..self.num_processes())
            .filter(|&p| self.allocation[(p, resource.index())] > 0)
            .map(ProcessId::new)
            .collect()
    }

    /// Returns true if `pid` holds anything at all.
    pub fn holds_any(&self, pid: ProcessId) -> bool {
        self.allocation.row(pid.index()).iter().any(|&amount| amount > 0)
    }

    /// One-hot request vector for a single unit of `resource`.
    pub fn unit_request(&self, resource: ResourceId) -> Vec<i64> {
        let mut request = vec![0; self.num_resources()];
        if let Some(slot) = request.get_mut(resource.index()) {
            *slot = 1;
        }
        request
    }

    /// Applies an already-validated request.
    pub(crate) fn commit(&mut self, pid: ProcessId, request: &[i64]) {
        for (r, &amount) in request.iter().enumerate() {
            self.available[r] -= amount;
            self.allocation[(pid.index(), r)] += amount;
        }
    }

    /// Returns every unit `pid` holds to the pool.
    ///
    /// Returns the released amounts per resource.
    pub fn release_all(&mut self, pid: ProcessId) -> Vec<i64> {
        let mut released = Vec::with_capacity(self.num_resources());
        for r in 0..self.num_resources() {
            let amount = self.allocation[(pid.index(), r)];
            released.push(amount);
            self.available[r] += amount;
            self.allocation[(pid.index(), r)] = 0;
        }
        released
    }

    /// Withdraws the claim of a finished process.
    ///
    /// A retired process has zero need and never constrains the safety
    /// check again.
    pub fn retire(&mut self, pid: ProcessId) {
        for r in 0..self.num_resources() {
            self.max_claim[(pid.index(), r)] = self.allocation[(pid.index(), r)];
        }
    }

    /// Checks the conservation and claim invariants.
    ///
    /// - `available[r] >= 0`
    /// - `available[r] + sum_p allocation[p][r] == total[r]`
    /// - `0 <= allocation[p][r] <= max_claim[p][r]`
    pub fn check_invariants(&self) -> Result<(), ModelError> {
        for r in 0..self.num_resources() {
            let name = &self.resources[r].name;
            if self.available[r] < 0 {
                return Err(ModelError::InvariantViolated(format!(
                    "available {} is negative for {}",
                    self.available[r], name
                )));
            }
            let allocated: i64 = (0..self.num_processes()).map(|p| self.allocation[(p, r)]).sum();
            if allocated + self.available[r] != self.total[r] {
                return Err(ModelError::InvariantViolated(format!(
                    "{} allocated + {} available != {} total for {}",
                    allocated, self.available[r], self.total[r], name
                )));
            }
            for p in 0..self.num_processes() {
                let held = self.allocation[(p, r)];
                if held < 0 || held > self.max_claim[(p, r)] {
                    return Err(ModelError::InvariantViolated(format!(
                        "{} holds {} of {} against a claim of {}",
                        ProcessId::new(p),
                        held,
                        name,
                        self.max_claim[(p, r)]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Copies the matrices out.
    pub fn snapshot(&self) -> AllocationSnapshot {
        let rows = |m: &DMatrix<i64>| -> Vec<Vec<i64>> {
            (0..m.nrows())
                .map(|p| m.row(p).iter().copied().collect())
                .collect()
        };
        AllocationSnapshot {
            available: self.available.iter().copied().collect(),
            allocation: rows(&self.allocation),
            max_claim: rows(&self.max_claim),
        }
    }
}
