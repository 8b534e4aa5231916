//! Stakeholder responses and provider resolutions.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::schedule_proposal::{ProposalEventType, ThreadState};
use crate::types::DbId;

pub const RESPONSE_CONFIRM: &str = "confirm";
pub const RESPONSE_REQUEST_CHANGE: &str = "request_change";
pub const RESPONSE_QUESTION: &str = "question";

pub const VALID_RESPONSE_TYPES: &[&str] =
    &[RESPONSE_CONFIRM, RESPONSE_REQUEST_CHANGE, RESPONSE_QUESTION];

pub const RESOLUTION_ACKNOWLEDGED: &str = "acknowledged";
pub const RESOLUTION_ACCEPTED: &str = "accepted";
pub const RESOLUTION_DECLINED: &str = "declined";
pub const RESOLUTION_PROPOSED_CHANGE: &str = "proposed_change";

pub const VALID_RESOLUTION_TYPES: &[&str] = &[
    RESOLUTION_ACKNOWLEDGED,
    RESOLUTION_ACCEPTED,
    RESOLUTION_DECLINED,
    RESOLUTION_PROPOSED_CHANGE,
];

pub const MAX_MESSAGE_LENGTH: usize = 4000;

pub fn validate_response_type(value: &str) -> Result<(), CoreError> {
    if VALID_RESPONSE_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid response type '{value}'. Must be one of: {}",
            VALID_RESPONSE_TYPES.join(", ")
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    Acknowledged,
    Accepted,
    Declined,
    ProposedChange,
}

impl ResolutionType {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            RESOLUTION_ACKNOWLEDGED => Ok(Self::Acknowledged),
            RESOLUTION_ACCEPTED => Ok(Self::Accepted),
            RESOLUTION_DECLINED => Ok(Self::Declined),
            RESOLUTION_PROPOSED_CHANGE => Ok(Self::ProposedChange),
            _ => Err(CoreError::Validation(format!(
                "Invalid resolution type '{s}'. Must be one of: {}",
                VALID_RESOLUTION_TYPES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledged => RESOLUTION_ACKNOWLEDGED,
            Self::Accepted => RESOLUTION_ACCEPTED,
            Self::Declined => RESOLUTION_DECLINED,
            Self::ProposedChange => RESOLUTION_PROPOSED_CHANGE,
        }
    }

    /// Only `proposed_change` opens a schedule proposal.
    pub fn opens_proposal(&self) -> bool {
        matches!(self, Self::ProposedChange)
    }
}

pub fn validate_message(message: Option<&str>, required: bool) -> Result<(), CoreError> {
    match message.map(str::trim) {
        None | Some("") if required => {
            Err(CoreError::Validation("Message must not be empty".to_string()))
        }
        Some(m) if m.len() > MAX_MESSAGE_LENGTH => Err(CoreError::Validation(format!(
            "Message must be at most {MAX_MESSAGE_LENGTH} characters"
        ))),
        _ => Ok(()),
    }
}

/// The event a `proposed_change` resolution should append to the thread.
///
/// An empty thread gets a fresh proposal; anything else is a counter. A
/// closed thread still yields `Countered` so the protocol reports
/// `THREAD_CLOSED` itself.
pub fn proposal_event_for(thread: &ThreadState) -> ProposalEventType {
    if thread.has_proposal || thread.is_closed {
        ProposalEventType::Countered
    } else {
        ProposalEventType::Proposed
    }
}

/// Keys the engine writes into the context of a resolution-driven proposal.
pub fn resolution_context(
    response_id: DbId,
    resolution_id: DbId,
) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert(
        "stakeholder_response_id".to_string(),
        serde_json::Value::from(response_id),
    );
    map.insert(
        "resolution_id".to_string(),
        serde_json::Value::from(resolution_id),
    );
    map
}
