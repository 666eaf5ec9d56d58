//! Stalemate Environment Abstraction Layer
//!
//! This crate provides the seam between the resource-allocation engine and
//! the host runtime. The core never calls `tokio::spawn` or reads a clock
//! directly; it goes through a [`RuntimeContext`]:
//! - Time (`now()`, `sleep()`)
//! - Concurrency (`spawn()` returning a [`WorkerHandle`])
//! - Randomness (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit run seed, every worker's
//! backoff sequence is reproducible from the seed number alone.
//!
//! # Example
//!
//! ```ignore
//! use stalemate_env::{RuntimeContext, TokioContext};
//!
//! let ctx = TokioContext::shared(42);
//! let mut handle = ctx.spawn("P1", async move {
//!     // worker protocol
//! });
//! if handle.join_timeout(Duration::from_secs(5)).await.is_err() {
//!     handle.abort_and_wait().await;
//! }
//! ```

mod context;
mod error;
mod handle;
mod telemetry;
mod tokio_impl;
mod types;

pub use context::RuntimeContext;
pub use error::EnvError;
pub use handle::WorkerHandle;
pub use telemetry::{TelemetryChannel, TelemetrySender};
pub use tokio_impl::TokioContext;
pub use types::{derive_seed, ProcessId, ResourceId};
