//! Schedule proposal event models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use n3_core::schedule_proposal::{ProposalEventType, ThreadEvent};
use n3_core::types::{DbId, Timestamp};

/// A row from the `schedule_proposal_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScheduleProposalEvent {
    pub id: DbId,
    pub run_id: DbId,
    pub actor_role: String,
    pub actor_id: String,
    pub event_type: String,
    pub proposed_start: Option<Timestamp>,
    pub proposed_end: Option<Timestamp>,
    pub note: Option<String>,
    pub proposal_context: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl ScheduleProposalEvent {
    /// Protocol view of a stored row. Rows are CHECK-constrained, so an
    /// unknown type cannot occur.
    pub fn thread_event(&self) -> Option<ThreadEvent> {
        ProposalEventType::from_str_value(&self.event_type)
            .ok()
            .map(|event_type| ThreadEvent {
                event_type,
                proposed_start: self.proposed_start,
                proposed_end: self.proposed_end,
            })
    }
}

/// Request body for `POST /service-runs/{id}/schedule-proposals`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProposalEvent {
    pub actor_role: String,
    #[validate(length(min = 1, max = 200))]
    pub actor_id: String,
    pub event_type: String,
    pub proposed_start: Option<Timestamp>,
    pub proposed_end: Option<Timestamp>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    pub proposal_context: Option<serde_json::Value>,
}

/// Values written for a new event after protocol checks.
#[derive(Debug, Clone)]
pub struct NewProposalEventRow {
    pub actor_role: String,
    pub actor_id: String,
    pub event_type: String,
    pub proposed_start: Option<Timestamp>,
    pub proposed_end: Option<Timestamp>,
    pub note: Option<String>,
    pub proposal_context: Option<serde_json::Value>,
}

/// A run's negotiation thread with derived state.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalThread {
    pub run_id: DbId,
    pub events: Vec<ScheduleProposalEvent>,
    pub turns_used: i64,
    pub turn_cap: i64,
    pub is_closed: bool,
    pub outcome: Option<String>,
    pub latest_start: Option<Timestamp>,
    pub latest_end: Option<Timestamp>,
}
