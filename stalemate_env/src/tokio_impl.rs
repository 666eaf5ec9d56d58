//! Production implementation of RuntimeContext using Tokio.

use crate::handle::WorkerHandle;
use crate::types::derive_seed;
use crate::RuntimeContext;
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Context backed by the Tokio scheduler and clock.
///
/// Time comes from `tokio::time::Instant`, so the same context runs against
/// the wall clock on a normal runtime and against a virtual clock on a
/// runtime started with `start_paused(true)`.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Run seed for worker RNG derivation
    seed: u64,
}

impl TokioContext {
    /// Creates a new TokioContext with the given run seed.
    pub fn new(seed: u64) -> Self {
        Self {
            start: Instant::now(),
            seed,
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl RuntimeContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> WorkerHandle
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        WorkerHandle::new(name, tokio::spawn(future))
    }

    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(derive_seed(self.seed, seed_extension))
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new(42);
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_tokio_context_deterministic_rng() {
        let ctx1 = TokioContext::new(42);
        let ctx2 = TokioContext::new(42);

        let a: u64 = ctx1.derive_rng(1).gen();
        let b: u64 = ctx2.derive_rng(1).gen();
        assert_eq!(a, b);

        let c: u64 = ctx1.derive_rng(2).gen();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_tokio_context_spawn() {
        let ctx = TokioContext::shared(7);
        let mut handle = ctx.spawn("P1", async {});

        assert_eq!(handle.name(), "P1");
        assert!(handle.join().await.is_ok());
        assert_eq!(ctx.seed(), 7);
    }
}
