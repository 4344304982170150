use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::lead::LeadId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadEventKind {
    Assigned,
    Scored,
    /// Emitted by the lead store, never by the routing engine.
    StatusChanged,
}

impl LeadEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Scored => "scored",
            Self::StatusChanged => "status_changed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadEvent {
    pub event_id: String,
    pub kind: LeadEventKind,
    pub lead_id: LeadId,
    pub correlation_id: String,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl LeadEvent {
    pub fn new(kind: LeadEventKind, lead_id: LeadId, correlation_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            lead_id,
            correlation_id: correlation_id.into(),
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);

/// Fire-and-forget notification sink. Failures are reported to the caller
/// for logging only and never undo the write that produced the event.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: LeadEvent) -> Result<(), PublishError>;
}

/// Stand-in for an absent sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: LeadEvent) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Writes every event to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: LeadEvent) -> Result<(), PublishError> {
        tracing::info!(
            event_name = "lead.event_published",
            event_kind = event.kind.as_str(),
            event_id = %event.event_id,
            lead_id = %event.lead_id,
            correlation_id = %event.correlation_id,
            metadata = ?event.metadata,
            "lead event published"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEventPublisher {
    events: Arc<Mutex<Vec<LeadEvent>>>,
    failing: bool,
}

impl InMemoryEventPublisher {
    /// A publisher that rejects every event, for exercising failure paths.
    pub fn failing() -> Self {
        Self { events: Arc::default(), failing: true }
    }

    pub fn events(&self) -> Vec<LeadEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_of(&self, kind: LeadEventKind) -> Vec<LeadEvent> {
        self.events().into_iter().filter(|event| event.kind == kind).collect()
    }
}

impl EventPublisher for InMemoryEventPublisher {
    fn publish(&self, event: LeadEvent) -> Result<(), PublishError> {
        if self.failing {
            return Err(PublishError("sink rejected event".to_string()));
        }
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EventPublisher, InMemoryEventPublisher, LeadEvent, LeadEventKind, NoopPublisher};
    use crate::domain::lead::LeadId;

    #[test]
    fn in_memory_publisher_records_events_with_metadata() {
        let publisher = InMemoryEventPublisher::default();
        publisher
            .publish(
                LeadEvent::new(LeadEventKind::Assigned, LeadId("L-42".to_owned()), "req-1")
                    .with_metadata("assignee", "7")
                    .with_metadata("method", "round_robin"),
            )
            .expect("publish");

        let events = publisher.events_of(LeadEventKind::Assigned);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].lead_id.0, "L-42");
        assert_eq!(events[0].correlation_id, "req-1");
        assert_eq!(events[0].metadata.get("assignee").map(String::as_str), Some("7"));
    }

    #[test]
    fn failing_publisher_reports_error_and_keeps_nothing() {
        let publisher = InMemoryEventPublisher::failing();
        let result =
            publisher.publish(LeadEvent::new(LeadEventKind::Scored, LeadId("L-1".into()), "req"));

        assert!(result.is_err());
        assert!(publisher.events().is_empty());
    }

    #[test]
    fn noop_publisher_accepts_everything() {
        let event = LeadEvent::new(LeadEventKind::StatusChanged, LeadId("L-1".into()), "req");
        assert_eq!(event.kind.as_str(), "status_changed");
        assert!(NoopPublisher.publish(event).is_ok());
    }
}
