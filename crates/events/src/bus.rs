//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application.
//! Handlers publish only after their transaction commits, so subscribers
//! never see an event for state that was rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use n3_core::types::DbId;

// ---------------------------------------------------------------------------
// Event type names
// ---------------------------------------------------------------------------

pub const SERVICE_RUN_CREATED: &str = "service_run.created";
pub const SERVICE_RUN_UPDATED: &str = "service_run.updated";
pub const SERVICE_RUN_PROMOTED: &str = "service_run.promoted";
pub const SERVICE_RUN_DEMOTED: &str = "service_run.demoted";
pub const ATTACHMENTS_ADDED: &str = "attachments.added";
pub const ATTACHMENTS_REMOVED: &str = "attachments.removed";
pub const SEGMENT_CREATED: &str = "segment.created";
pub const SIGNAL_RECORDED: &str = "signal.recorded";
pub const SIGNAL_CLEARED: &str = "signal.cleared";
pub const RISK_EVALUATED: &str = "risk.evaluated";
pub const REPLAN_BUNDLE_OPENED: &str = "replan_bundle.opened";
pub const REPLAN_BUNDLE_ACTIONED: &str = "replan_bundle.actioned";
pub const REPLAN_BUNDLE_DISMISSED: &str = "replan_bundle.dismissed";
pub const REPLAN_ACTION_RECORDED: &str = "replan_action.recorded";
pub const READINESS_LOCKED: &str = "readiness.locked";
pub const READINESS_UNLOCKED: &str = "readiness.unlocked";
pub const HANDOFF_CREATED: &str = "handoff.created";
pub const SCHEDULE_PROPOSAL_CREATED: &str = "schedule_proposal.created";
pub const STAKEHOLDER_RESPONSE_RECORDED: &str = "stakeholder_response.recorded";
pub const STAKEHOLDER_RESPONSE_RESOLVED: &str = "stakeholder_response.resolved";

// ---------------------------------------------------------------------------
// CoordinationEvent
// ---------------------------------------------------------------------------

/// Something that changed on a service run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationEvent {
    /// Dot-separated event name, e.g. `"readiness.locked"`.
    pub event_type: String,

    /// Run the event belongs to. Every event the engine emits has one.
    pub run_id: Option<DbId>,

    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl CoordinationEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            run_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for an event scoped to a run.
    pub fn for_run(event_type: impl Into<String>, run_id: DbId) -> Self {
        Self::new(event_type).with_run(run_id)
    }

    pub fn with_run(mut self, run_id: DbId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest messages are dropped and slow
/// receivers observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<CoordinationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently if there are
    /// none.
    pub fn publish(&self, event: CoordinationEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_run_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            CoordinationEvent::for_run(READINESS_LOCKED, 42)
                .with_payload(serde_json::json!({"snapshot_id": 7})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, READINESS_LOCKED);
        assert_eq!(received.run_id, Some(42));
        assert_eq!(received.payload["snapshot_id"], 7);
    }

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(CoordinationEvent::for_run(SERVICE_RUN_PROMOTED, 1));

        assert_eq!(rx1.recv().await.unwrap().event_type, SERVICE_RUN_PROMOTED);
        assert_eq!(rx2.recv().await.unwrap().event_type, SERVICE_RUN_PROMOTED);
    }

    #[tokio::test]
    async fn small_buffer_lags_slow_receiver() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..3 {
            bus.publish(CoordinationEvent::for_run(SIGNAL_RECORDED, 1));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::default().publish(CoordinationEvent::new("orphan.event"));
    }

    #[test]
    fn new_event_has_empty_payload() {
        let event = CoordinationEvent::new("bare.event");
        assert!(event.run_id.is_none());
        assert!(event.payload.is_object());
    }
}
