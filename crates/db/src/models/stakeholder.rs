//! Stakeholder response and resolution models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use n3_core::types::{DbId, Timestamp};

use super::schedule_proposal::ScheduleProposalEvent;

/// A row from the `stakeholder_responses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StakeholderResponse {
    pub id: DbId,
    pub run_id: DbId,
    pub response_type: String,
    pub message: String,
    pub stakeholder_id: String,
    pub stakeholder_name: Option<String>,
    pub responded_at: Timestamp,
    pub current_resolution_id: Option<DbId>,
}

/// A row from the `stakeholder_resolutions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Resolution {
    pub id: DbId,
    pub response_id: DbId,
    pub resolution_type: String,
    pub message: Option<String>,
    pub resolved_at: Timestamp,
}

/// A response with its authoritative resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseWithResolution {
    #[serde(flatten)]
    pub response: StakeholderResponse,
    pub current_resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStakeholderResponse {
    pub response_type: String,
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
    #[validate(length(min = 1, max = 200))]
    pub stakeholder_id: String,
    #[validate(length(max = 200))]
    pub stakeholder_name: Option<String>,
}

/// Window and context a `proposed_change` resolution forwards to the
/// negotiation thread.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolutionProposal {
    pub actor_id: Option<String>,
    pub proposed_start: Option<Timestamp>,
    pub proposed_end: Option<Timestamp>,
    pub note: Option<String>,
    pub proposal_context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateResolution {
    pub resolution_type: String,
    #[validate(length(max = 4000))]
    pub message: Option<String>,
    pub proposal: Option<ResolutionProposal>,
}

/// Why a resolution-driven proposal was not created.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalAttemptError {
    pub code: String,
    pub kind: String,
    pub message: String,
}

/// Outcome of the proposal a `proposed_change` resolution tries to open.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ProposalAttempt {
    Created { event: ScheduleProposalEvent },
    Failed { error: ProposalAttemptError },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub resolution: Resolution,
    /// Present only for `proposed_change`.
    pub proposal_attempt: Option<ProposalAttempt>,
}
