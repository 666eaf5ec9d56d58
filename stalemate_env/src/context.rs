//! Core runtime context trait for Stalemate workers.

use crate::handle::WorkerHandle;
use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::time::Duration;

/// The central interface for runtime interaction.
///
/// This trait abstracts the host runtime so that the concurrent driver can
/// launch workers, measure time and draw randomness without knowing whether
/// it runs on a wall clock or on a paused (virtual) clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::spawn`, `tokio::time`
///
/// # Determinism
///
/// All randomness handed to workers comes from `derive_rng`, which mixes the
/// run seed with a per-worker extension. Two runs with the same seed draw the
/// same backoff intervals in the same order.
#[async_trait]
pub trait RuntimeContext: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since context creation.
    fn now(&self) -> Duration;

    /// Suspends the calling worker for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Launches a unit of concurrent work.
    ///
    /// The returned handle lets the coordinator join with a deadline and
    /// forcibly terminate the worker.
    fn spawn<F>(&self, name: &str, future: F) -> WorkerHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Builds a deterministic RNG from the run seed and an extension.
    ///
    /// # Arguments
    /// * `seed_extension` - Usually the worker's ordinal
    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng;

    /// Returns the run seed (for logging/debugging).
    fn seed(&self) -> u64;
}
