//! Telemetry channel between workers and the coordinator.

use crate::error::EnvError;
use tokio::sync::mpsc;

/// Bounded channel that carries per-worker records back to the coordinator.
///
/// # Packet Flow
///
/// ```text
/// Worker P1 ──publish()──┐
/// Worker P2 ──publish()──┼──> [bounded queue] ──drain()──> Coordinator
/// Worker Pn ──publish()──┘
/// ```
///
/// Provisioning can fail; callers fall back to [`TelemetrySender::disabled`]
/// and keep running without telemetry.
pub struct TelemetryChannel<T> {
    tx: mpsc::Sender<T>,
    rx: mpsc::Receiver<T>,
}

impl<T: Send + 'static> TelemetryChannel<T> {
    /// Opens a channel holding up to `capacity` undrained records.
    ///
    /// # Errors
    /// * `EnvError::ChannelUnavailable` - `capacity` is zero
    pub fn open(capacity: usize) -> Result<Self, EnvError> {
        if capacity == 0 {
            return Err(EnvError::channel("no capacity provisioned for metrics queue"));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self { tx, rx })
    }

    /// Returns a sender for one worker.
    pub fn sender(&self) -> TelemetrySender<T> {
        TelemetrySender {
            tx: Some(self.tx.clone()),
        }
    }

    /// Collects every record published so far without waiting.
    pub fn drain(&mut self) -> Vec<T> {
        let mut records = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            records.push(record);
        }
        records
    }
}

/// Worker-side end of a [`TelemetryChannel`].
pub struct TelemetrySender<T> {
    tx: Option<mpsc::Sender<T>>,
}

impl<T: Send + 'static> TelemetrySender<T> {
    /// A sender that drops everything (telemetry disabled for the run).
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Returns true if records reach a coordinator.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Publishes a record.
    ///
    /// # Returns
    /// `true` if the record was queued.
    pub async fn publish(&self, record: T) -> bool {
        match &self.tx {
            Some(tx) => tx.send(record).await.is_ok(),
            None => false,
        }
    }
}

impl<T> Clone for TelemetrySender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_unavailable() {
        let result = TelemetryChannel::<u32>::open(0);
        assert!(matches!(result, Err(EnvError::ChannelUnavailable(_))));
    }

    #[tokio::test]
    async fn test_publish_and_drain() {
        let mut channel = TelemetryChannel::open(4).unwrap();
        let sender = channel.sender();

        assert!(sender.publish(1u32).await);
        assert!(sender.clone().publish(2u32).await);

        assert_eq!(channel.drain(), vec![1, 2]);
        assert!(channel.drain().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_sender_drops_records() {
        let sender = TelemetrySender::<u32>::disabled();
        assert!(!sender.is_enabled());
        assert!(!sender.publish(7).await);
    }
}
