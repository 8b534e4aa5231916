//! Turn-capped schedule negotiation between a provider and stakeholders.
//!
//! A thread is the ordered list of proposal events for one run. It starts
//! empty, opens with `proposed`, continues with `countered`, and ends with
//! a terminal `accepted` or `declined`. Closed threads never reopen.

use serde::{Deserialize, Serialize};

use crate::error::{
    CoreError, NO_OPEN_PROPOSAL, PROPOSAL_ALREADY_OPEN, PROPOSAL_NOT_ALLOWED, THREAD_CLOSED,
    TURN_CAP_EXCEEDED,
};
use crate::policy::CoordinationPolicy;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const EVENT_PROPOSED: &str = "proposed";
pub const EVENT_COUNTERED: &str = "countered";
pub const EVENT_ACCEPTED: &str = "accepted";
pub const EVENT_DECLINED: &str = "declined";

pub const VALID_EVENT_TYPES: &[&str] =
    &[EVENT_PROPOSED, EVENT_COUNTERED, EVENT_ACCEPTED, EVENT_DECLINED];

pub const ROLE_PROVIDER: &str = "provider";
pub const ROLE_STAKEHOLDER: &str = "stakeholder";

pub const VALID_ACTOR_ROLES: &[&str] = &[ROLE_PROVIDER, ROLE_STAKEHOLDER];

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalEventType {
    Proposed,
    Countered,
    Accepted,
    Declined,
}

impl ProposalEventType {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            EVENT_PROPOSED => Ok(Self::Proposed),
            EVENT_COUNTERED => Ok(Self::Countered),
            EVENT_ACCEPTED => Ok(Self::Accepted),
            EVENT_DECLINED => Ok(Self::Declined),
            _ => Err(CoreError::Validation(format!(
                "Invalid proposal event type '{s}'. Must be one of: {}",
                VALID_EVENT_TYPES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => EVENT_PROPOSED,
            Self::Countered => EVENT_COUNTERED,
            Self::Accepted => EVENT_ACCEPTED,
            Self::Declined => EVENT_DECLINED,
        }
    }

    /// Accepted and declined close the thread.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }

    /// Proposed and countered each consume a turn.
    pub fn uses_turn(&self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Provider,
    Stakeholder,
}

impl ActorRole {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            ROLE_PROVIDER => Ok(Self::Provider),
            ROLE_STAKEHOLDER => Ok(Self::Stakeholder),
            _ => Err(CoreError::Validation(format!(
                "Invalid actor role '{s}'. Must be one of: {}",
                VALID_ACTOR_ROLES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => ROLE_PROVIDER,
            Self::Stakeholder => ROLE_STAKEHOLDER,
        }
    }
}

// ---------------------------------------------------------------------------
// Thread state
// ---------------------------------------------------------------------------

/// The parts of a stored event the protocol needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEvent {
    pub event_type: ProposalEventType,
    pub proposed_start: Option<Timestamp>,
    pub proposed_end: Option<Timestamp>,
}

/// Derived view of a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadState {
    pub turns_used: i64,
    pub is_closed: bool,
    /// The terminal event type, once closed.
    pub outcome: Option<ProposalEventType>,
    pub has_proposal: bool,
    pub latest_start: Option<Timestamp>,
    pub latest_end: Option<Timestamp>,
}

/// Fold events (oldest first) into the thread state.
pub fn derive_state(events: &[ThreadEvent]) -> ThreadState {
    let mut state = ThreadState {
        turns_used: 0,
        is_closed: false,
        outcome: None,
        has_proposal: false,
        latest_start: None,
        latest_end: None,
    };
    for event in events {
        if event.event_type.uses_turn() {
            state.turns_used += 1;
            state.has_proposal = true;
        }
        if event.proposed_start.is_some() && event.proposed_end.is_some() {
            state.latest_start = event.proposed_start;
            state.latest_end = event.proposed_end;
        }
        if event.event_type.is_terminal() && state.outcome.is_none() {
            state.is_closed = true;
            state.outcome = Some(event.event_type);
        }
    }
    state
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A new event as submitted by a caller.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub actor_role: ActorRole,
    pub event_type: ProposalEventType,
    pub proposed_start: Option<Timestamp>,
    pub proposed_end: Option<Timestamp>,
    pub proposal_context: Option<serde_json::Value>,
}

/// Check a new event against the thread and return the window to store.
///
/// Checks run in a fixed order: closed thread, turn cap, thread shape,
/// initiator permission, then the window itself. An `accepted` event
/// without its own window adopts the latest proposed one.
pub fn validate_new_event(
    state: &ThreadState,
    event: &NewEvent,
    policy: &CoordinationPolicy,
) -> Result<(Option<Timestamp>, Option<Timestamp>), CoreError> {
    if state.is_closed {
        return Err(CoreError::conflict(
            THREAD_CLOSED,
            format!(
                "Schedule negotiation is closed ({})",
                state.outcome.map(|o| o.as_str()).unwrap_or("closed")
            ),
        ));
    }

    if event.event_type.uses_turn() && state.turns_used >= policy.proposal_turn_cap {
        return Err(CoreError::limit(
            TURN_CAP_EXCEEDED,
            format!(
                "Turn cap of {} reached; only accepted or declined may follow",
                policy.proposal_turn_cap
            ),
        ));
    }

    match event.event_type {
        ProposalEventType::Proposed if state.has_proposal => {
            return Err(CoreError::precondition(
                PROPOSAL_ALREADY_OPEN,
                "A proposal is already open; counter it instead",
            ));
        }
        ProposalEventType::Countered | ProposalEventType::Accepted | ProposalEventType::Declined
            if !state.has_proposal =>
        {
            return Err(CoreError::precondition(
                NO_OPEN_PROPOSAL,
                format!("Cannot {} before a proposal exists", event.event_type.as_str()),
            ));
        }
        _ => {}
    }

    if event.event_type == ProposalEventType::Proposed
        && event.actor_role == ActorRole::Stakeholder
        && !policy.stakeholder_may_initiate
    {
        return Err(CoreError::precondition(
            PROPOSAL_NOT_ALLOWED,
            "Stakeholders may not open a schedule negotiation",
        ));
    }

    match event.event_type {
        ProposalEventType::Proposed | ProposalEventType::Countered => {
            match (event.proposed_start, event.proposed_end) {
                (Some(start), Some(end)) if start < end => Ok((Some(start), Some(end))),
                (Some(_), Some(_)) => Err(CoreError::Validation(
                    "Proposed start must be before proposed end".to_string(),
                )),
                _ => Err(CoreError::Validation(format!(
                    "A {} event requires both proposed_start and proposed_end",
                    event.event_type.as_str()
                ))),
            }
        }
        ProposalEventType::Accepted => match (event.proposed_start, event.proposed_end) {
            (None, None) => Ok((state.latest_start, state.latest_end)),
            (Some(start), Some(end)) if start < end => Ok((Some(start), Some(end))),
            _ => Err(CoreError::Validation(
                "An accepted window must have a start before its end".to_string(),
            )),
        },
        ProposalEventType::Declined => Ok((None, None)),
    }
}

/// Key a non-object caller context is kept under when keys are merged in.
pub const CALLER_CONTEXT_KEY: &str = "caller_context";

/// Overlay `overrides` onto an optional caller context.
///
/// An object context gains the override keys. Any other value is kept
/// untouched under [`CALLER_CONTEXT_KEY`].
pub fn merge_context(
    base: Option<serde_json::Value>,
    overrides: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    let mut merged = match base {
        Some(serde_json::Value::Object(map)) => map,
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert(CALLER_CONTEXT_KEY.to_string(), other);
            map
        }
        None => serde_json::Map::new(),
    };
    merged.extend(overrides);
    serde_json::Value::Object(merged)
}
