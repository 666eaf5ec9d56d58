//! Error types for the Stalemate environment abstraction.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// Telemetry channel could not be provisioned
    #[error("Telemetry channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// Worker panicked or was cancelled before completing
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a channel-unavailable error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelUnavailable(msg.into())
    }

    /// Creates a timeout error from a duration.
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout(u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_millis() {
        assert_eq!(EnvError::timeout(Duration::from_millis(1500)), EnvError::Timeout(1500));
        assert!(EnvError::timeout(Duration::ZERO).is_timeout());
    }

    #[test]
    fn test_timeout_saturates() {
        assert_eq!(EnvError::timeout(Duration::MAX), EnvError::Timeout(u64::MAX));
    }
}
