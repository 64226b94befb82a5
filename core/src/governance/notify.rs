//! Notification sink boundary (C10).
//!
//! An abstract seam in the same spirit as `resilience::fallback::ModelExecutor`:
//! the core only depends on a trait, never a concrete transport, so gateway
//! code can plug in email/webhook/log sinks without this module knowing
//! about any of them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::governance::types::Timestamp;

/// The kinds of events the core ever emits (spec.md §4.10).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationEventType {
    VoteStart,
    VoteReminder,
    VoteReceived,
    VoteComplete,
    VoteFinalized,
}

impl fmt::Display for NotificationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationEventType::VoteStart => "vote-start",
            NotificationEventType::VoteReminder => "vote-reminder",
            NotificationEventType::VoteReceived => "vote-received",
            NotificationEventType::VoteComplete => "vote-complete",
            NotificationEventType::VoteFinalized => "vote-finalized",
        };
        write!(f, "{s}")
    }
}

/// One notification event (spec.md §4.10).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: NotificationEventType,
    pub topic_id: String,
    pub timestamp: Timestamp,
    pub message: String,
    pub recipients: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Boundary the core emits events through. Delivery, persistence, and
/// deduplication are the sink's responsibility; the core never blocks on
/// delivery beyond this call returning (spec.md §4.10).
///
/// Errors are logged by callers but never fail the originating governance
/// operation (spec.md §7) — this trait still returns a `Result` so a sink
/// implementation has somewhere to report a failure for logging.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, event: NotificationEvent) -> Result<(), String>;
}

/// A sink that appends every event to an in-memory log, for tests and for
/// composing with a persisted `notifications.json` writer.
#[derive(Default)]
pub struct InMemoryNotificationSink {
    events: parking_lot::Mutex<Vec<NotificationEvent>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn send(&self, event: NotificationEvent) -> Result<(), String> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_records_events_in_order() {
        let sink = InMemoryNotificationSink::new();
        sink.send(NotificationEvent {
            id: "evt-1".to_string(),
            event_type: NotificationEventType::VoteStart,
            topic_id: "BIP-01".to_string(),
            timestamp: Timestamp::from_millis(0),
            message: "voting opened".to_string(),
            recipients: vec!["model-a".to_string()],
            metadata: None,
        })
        .await
        .unwrap();

        sink.send(NotificationEvent {
            id: "evt-2".to_string(),
            event_type: NotificationEventType::VoteReminder,
            topic_id: "BIP-01".to_string(),
            timestamp: Timestamp::from_millis(1_000),
            message: "reminder".to_string(),
            recipients: vec!["model-b".to_string()],
            metadata: None,
        })
        .await
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "evt-1");
        assert_eq!(events[1].event_type, NotificationEventType::VoteReminder);
    }
}
