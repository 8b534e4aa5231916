//! Service run status machine and lifecycle gating.
//!
//! The only transitions owned by the engine are `draft -> scheduled`
//! (promote) and `scheduled -> draft` (demote). `in_progress`, `completed`
//! and `cancelled` are set by external triggers; the engine only reads
//! them to decide which operations are legal.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, INVALID_RUN_STATE};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const RUN_STATUS_DRAFT: &str = "draft";
pub const RUN_STATUS_SCHEDULED: &str = "scheduled";
pub const RUN_STATUS_IN_PROGRESS: &str = "in_progress";
pub const RUN_STATUS_COMPLETED: &str = "completed";
pub const RUN_STATUS_CANCELLED: &str = "cancelled";

/// All valid run status strings.
pub const VALID_RUN_STATUSES: &[&str] = &[
    RUN_STATUS_DRAFT,
    RUN_STATUS_SCHEDULED,
    RUN_STATUS_IN_PROGRESS,
    RUN_STATUS_COMPLETED,
    RUN_STATUS_CANCELLED,
];

/// Warning codes returned alongside a successful promotion.
pub const WARNING_ZONE_NOT_ASSIGNED: &str = "ZONE_NOT_ASSIGNED";
pub const WARNING_NO_ATTACHED_REQUESTS: &str = "NO_ATTACHED_REQUESTS";
pub const WARNING_SCHEDULE_WINDOW_MISSING: &str = "SCHEDULE_WINDOW_MISSING";

/// Maximum length of a run name.
pub const MAX_RUN_NAME_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl RunStatus {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            RUN_STATUS_DRAFT => Ok(Self::Draft),
            RUN_STATUS_SCHEDULED => Ok(Self::Scheduled),
            RUN_STATUS_IN_PROGRESS => Ok(Self::InProgress),
            RUN_STATUS_COMPLETED => Ok(Self::Completed),
            RUN_STATUS_CANCELLED => Ok(Self::Cancelled),
            _ => Err(CoreError::Validation(format!(
                "Invalid run status '{s}'. Must be one of: {}",
                VALID_RUN_STATUSES.join(", ")
            ))),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => RUN_STATUS_DRAFT,
            Self::Scheduled => RUN_STATUS_SCHEDULED,
            Self::InProgress => RUN_STATUS_IN_PROGRESS,
            Self::Completed => RUN_STATUS_COMPLETED,
            Self::Cancelled => RUN_STATUS_CANCELLED,
        }
    }

    /// Draft and scheduled runs are still being planned; attachment,
    /// snapshot and handoff operations are only legal in these states.
    pub fn is_planning(&self) -> bool {
        matches!(self, Self::Draft | Self::Scheduled)
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Outcome of planning a promote/demote against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Already in the target state; nothing to write.
    NoOp,
    /// Write the new status.
    Apply { from: RunStatus, to: RunStatus },
}

/// Plan a transition to `target`, which must be draft or scheduled.
///
/// Runs that have left the planning states can be neither promoted nor
/// demoted.
pub fn plan_transition(current: RunStatus, target: RunStatus) -> Result<TransitionPlan, CoreError> {
    if !target.is_planning() {
        return Err(CoreError::precondition(
            INVALID_RUN_STATE,
            format!(
                "Transition to '{}' is not owned by the coordination engine",
                target.as_str()
            ),
        ));
    }
    if current == target {
        return Ok(TransitionPlan::NoOp);
    }
    if !current.is_planning() {
        return Err(CoreError::precondition(
            INVALID_RUN_STATE,
            format!(
                "Cannot move a '{}' run to '{}'",
                current.as_str(),
                target.as_str()
            ),
        ));
    }
    Ok(TransitionPlan::Apply {
        from: current,
        to: target,
    })
}

/// Reject `operation` unless the run is draft or scheduled.
pub fn ensure_planning_state(status: RunStatus, operation: &str) -> Result<(), CoreError> {
    if status.is_planning() {
        Ok(())
    } else {
        Err(CoreError::precondition(
            INVALID_RUN_STATE,
            format!(
                "Cannot {operation} while run is '{}'; run must be draft or scheduled",
                status.as_str()
            ),
        ))
    }
}

// ---------------------------------------------------------------------------
// Promotion warnings
// ---------------------------------------------------------------------------

/// A non-fatal advisory returned with a successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleWarning {
    pub code: &'static str,
    pub message: String,
}

/// Advisories for promoting a run. None of these block the transition.
pub fn promotion_warnings(
    zone_id: Option<DbId>,
    attached_count: i64,
    starts_at: Option<Timestamp>,
    ends_at: Option<Timestamp>,
) -> Vec<LifecycleWarning> {
    let mut warnings = Vec::new();
    if zone_id.is_none() {
        warnings.push(LifecycleWarning {
            code: WARNING_ZONE_NOT_ASSIGNED,
            message: "Run has no zone assigned; eligible requests cannot be matched by zone"
                .to_string(),
        });
    }
    if attached_count == 0 {
        warnings.push(LifecycleWarning {
            code: WARNING_NO_ATTACHED_REQUESTS,
            message: "Run has no attached maintenance requests".to_string(),
        });
    }
    if starts_at.is_none() || ends_at.is_none() {
        warnings.push(LifecycleWarning {
            code: WARNING_SCHEDULE_WINDOW_MISSING,
            message: "Run has no complete scheduling window".to_string(),
        });
    }
    warnings
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Zone assignment requires a portal.
pub fn validate_location(portal_id: Option<DbId>, zone_id: Option<DbId>) -> Result<(), CoreError> {
    if zone_id.is_some() && portal_id.is_none() {
        return Err(CoreError::Validation(
            "A zone can only be assigned once a portal is set".to_string(),
        ));
    }
    Ok(())
}

/// Both ends optional, but when both are present start must precede end.
pub fn validate_window(
    starts_at: Option<Timestamp>,
    ends_at: Option<Timestamp>,
) -> Result<(), CoreError> {
    if let (Some(start), Some(end)) = (starts_at, ends_at) {
        if start >= end {
            return Err(CoreError::Validation(
                "Scheduling window start must be before its end".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn validate_run_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Run name must not be empty".to_string()));
    }
    if trimmed.len() > MAX_RUN_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Run name must be at most {MAX_RUN_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}
