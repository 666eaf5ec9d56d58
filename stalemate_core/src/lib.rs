//! Stalemate Core - Resource Allocation & Deadlock Analysis Engine
//!
//! Models contention for exclusive and countable resources and compares four
//! acquisition policies:
//! 1. **Naive**: grant whenever free (circular waits possible)
//! 2. **Ordered**: global acquisition order (prevention)
//! 3. **Retry**: timeout plus randomized backoff (recovery)
//! 4. **Banker**: grant only into safe states (avoidance)
//!
//! Two drivers share the same model and policies: a deterministic
//! discrete-step [`StepScheduler`] with wait-for-graph detection, and a
//! [`ConcurrentDriver`] that launches real workers through a
//! [`RuntimeContext`](stalemate_env::RuntimeContext) and detects deadlocks by
//! liveness timeout.

pub mod allocation;
pub mod banker;
pub mod concurrent;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod locks;
pub mod metrics;
pub mod model;
pub mod policy;
pub mod report;
pub mod scheduler;

// Re-export key types for convenience
pub use allocation::{AllocationSnapshot, AllocationState};
pub use banker::{is_safe, safe_sequence, SharedBanker};
pub use concurrent::{ConcurrentDriver, ConcurrentScenario, WorkerSpec};
pub use config::RunConfig;
pub use detector::{detect, Detection, WaitForGraph};
pub use error::ModelError;
pub use events::{Event, EventKind, EventLog, EventSink, NullSink};
pub use locks::{LockTable, ResourceLock};
pub use metrics::{AggregateMetrics, MetricsCollector, MetricsSummary, RunStatus, WorkerMetrics};
pub use model::{PendingRequest, Process, ProcessState, Resource};
pub use policy::{DenyReason, Policy, RequestOutcome, RetryPolicy};
pub use report::{ConcurrentReport, DeadlockInfo, LeakedResource, Report, StateSnapshot};
pub use scheduler::{StepScheduler, StopReason};
