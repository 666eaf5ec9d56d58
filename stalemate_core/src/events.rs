//! Structured event sink.
//!
//! Drivers and policies never print; they emit [`Event`] records into an
//! injected [`EventSink`]. Rendering (text tables, JSON reports) is a pure
//! formatting pass over the collected records.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Acquire,
    Blocked,
    Release,
    Complete,
    Deadlock,
    Finish,
    Info,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Acquire => "acquire",
            EventKind::Blocked => "blocked",
            EventKind::Release => "release",
            EventKind::Complete => "complete",
            EventKind::Deadlock => "deadlock",
            EventKind::Finish => "finish",
            EventKind::Info => "info",
        }
    }
}

/// One structured event.
///
/// `time` is the step number in discrete mode and milliseconds since driver
/// start in concurrent mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: u64,
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    pub fn new(time: u64, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            time,
            kind,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches a structured payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Append-only destination for events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// In-memory sink shared between the driver and its workers.
///
/// Every emitted event is also forwarded to `tracing`: deadlocks at `warn`,
/// run start/finish at `info`, everything else at `debug`.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far, in emission order.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events of one kind, in emission order.
    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: Event) {
        match event.kind {
            EventKind::Deadlock => tracing::warn!(t = event.time, "{}", event.message),
            EventKind::Start | EventKind::Finish => tracing::info!(t = event.time, "{}", event.message),
            kind => tracing::debug!(t = event.time, kind = kind.as_str(), "{}", event.message),
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_log_keeps_order() {
        let log = EventLog::new();
        log.emit(Event::new(0, EventKind::Start, "go"));
        log.emit(Event::new(1, EventKind::Acquire, "P1 acquired R1"));
        log.emit(Event::new(1, EventKind::Blocked, "P2 blocked"));

        assert_eq!(log.len(), 3);
        let kinds: Vec<_> = log.snapshot().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Start, EventKind::Acquire, EventKind::Blocked]);
        assert_eq!(log.of_kind(EventKind::Blocked).len(), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let log = EventLog::new();
        let worker_view = log.clone();
        worker_view.emit(Event::new(5, EventKind::Info, "hello"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let plain = Event::new(2, EventKind::Release, "P1 releasing R1");
        let value = serde_json::to_value(&plain).unwrap();
        assert_eq!(value["kind"], "release");
        assert!(value.get("data").is_none());

        let rich = Event::new(3, EventKind::Deadlock, "cycle").with_data(json!({"cycle": ["P1", "P2"]}));
        let value = serde_json::to_value(&rich).unwrap();
        assert_eq!(value["data"]["cycle"][1], "P2");
        assert_eq!(value["time"], 3);
    }
}
