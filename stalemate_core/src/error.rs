//! Error types for scenario construction and shared-state bookkeeping.
//!
//! Denied requests are not errors; they are reported as
//! [`DenyReason`](crate::policy::DenyReason) values.

use thiserror::Error;

/// Errors raised while building or checking a scenario's model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A plan or request names a resource that does not exist
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// A declared claim can never be satisfied
    #[error("Claim of {process} on {resource} is {claim} but capacity is {capacity}")]
    ClaimExceedsCapacity {
        process: String,
        resource: String,
        claim: i64,
        capacity: i64,
    },

    /// Matrix or vector shape does not match the resource list
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Scenario has no processes
    #[error("Scenario has no processes")]
    NoProcesses,

    /// Scenario has no resources
    #[error("Scenario has no resources")]
    NoResources,

    /// Resource declared with a capacity below one
    #[error("Resource {0} has no capacity")]
    ZeroCapacity(String),

    /// Allocation bookkeeping went inconsistent
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    /// Concurrent resource lock was closed underneath a worker
    #[error("Resource {0} is closed")]
    ResourceClosed(String),
}
