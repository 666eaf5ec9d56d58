//! Run configuration shared by both drivers.

use crate::policy::RetryPolicy;
use std::time::Duration;

/// Timing, budget and seeding knobs of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Time a worker holds each resource (concurrent mode)
    pub hold_time: Duration,

    /// Liveness deadline before survivors are declared deadlocked
    pub deadlock_timeout: Duration,

    /// Bound on a single acquisition in retry mode
    pub retry_timeout: Duration,

    /// Step budget of the discrete driver
    pub max_steps: u64,

    /// Steps a process holds a fresh grant before moving on (discrete mode)
    pub hold_steps: u32,

    /// Blocked steps tolerated before a retry attempt is abandoned
    pub retry_timeout_steps: u32,

    /// Upper bound of the discrete backoff
    pub backoff_steps: u32,

    /// Master seed for every random draw of the run
    pub seed: u64,

    /// Number of concurrent workers
    pub workers: usize,

    /// Telemetry queue capacity (0 = telemetry unavailable)
    pub telemetry_capacity: usize,

    /// Retry ceiling (None = unbounded)
    pub max_retries: Option<u32>,

    /// Log `completed/total` as workers finish
    pub progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            hold_time: Duration::from_millis(800),
            deadlock_timeout: Duration::from_secs(5),
            retry_timeout: Duration::from_secs(1),
            max_steps: 50,
            hold_steps: 0,
            retry_timeout_steps: 2,
            backoff_steps: 4,
            seed: 42,
            workers: 2,
            telemetry_capacity: 64,
            max_retries: None,
            progress: false,
        }
    }
}

impl RunConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_hold_time(mut self, hold: Duration) -> Self {
        self.hold_time = hold;
        self
    }

    pub fn with_deadlock_timeout(mut self, timeout: Duration) -> Self {
        self.deadlock_timeout = timeout;
        self
    }

    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_hold_steps(mut self, steps: u32) -> Self {
        self.hold_steps = steps;
        self
    }

    pub fn with_retry_steps(mut self, timeout_steps: u32, backoff_steps: u32) -> Self {
        self.retry_timeout_steps = timeout_steps;
        self.backoff_steps = backoff_steps;
        self
    }

    pub fn with_max_retries(mut self, max: Option<u32>) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_telemetry_capacity(mut self, capacity: usize) -> Self {
        self.telemetry_capacity = capacity;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Discrete retry parameters derived from this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout_steps: self.retry_timeout_steps,
            backoff_steps: self.backoff_steps,
            max_retries: self.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.hold_time, Duration::from_millis(800));
        assert_eq!(config.deadlock_timeout, Duration::from_secs(5));
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.seed, 42);
        assert_eq!(config.max_retries, None);
    }

    #[test]
    fn test_builder_and_retry_policy() {
        let config = RunConfig::default()
            .with_seed(7)
            .with_retry_steps(3, 6)
            .with_max_retries(Some(10));
        let retry = config.retry_policy();
        assert_eq!(config.seed, 7);
        assert_eq!(retry.timeout_steps, 3);
        assert_eq!(retry.backoff_steps, 6);
        assert_eq!(retry.max_retries, Some(10));
    }
}
