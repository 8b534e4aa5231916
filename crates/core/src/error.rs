use serde::Serialize;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

pub const NOT_FOUND: &str = "NOT_FOUND";
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Run status does not allow the requested operation.
pub const INVALID_RUN_STATE: &str = "INVALID_RUN_STATE";
/// One or more maintenance requests cannot be attached to the run.
pub const NOT_ELIGIBLE: &str = "NOT_ELIGIBLE";
/// Eligibility or handoff requested before a readiness snapshot exists.
pub const NO_SNAPSHOT: &str = "NO_SNAPSHOT";
/// Countered/accepted/declined with no proposal on the thread.
pub const NO_OPEN_PROPOSAL: &str = "NO_OPEN_PROPOSAL";
/// `proposed` on a thread that already carries a proposal.
pub const PROPOSAL_ALREADY_OPEN: &str = "PROPOSAL_ALREADY_OPEN";
/// Actor is not permitted to open the negotiation thread.
pub const PROPOSAL_NOT_ALLOWED: &str = "PROPOSAL_NOT_ALLOWED";

pub const LIMIT_EXCEEDED: &str = "LIMIT_EXCEEDED";
pub const TURN_CAP_EXCEEDED: &str = "TURN_CAP_EXCEEDED";

pub const ALREADY_LOCKED: &str = "ALREADY_LOCKED";
pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
pub const ALREADY_CLOSED: &str = "ALREADY_CLOSED";
pub const THREAD_CLOSED: &str = "THREAD_CLOSED";

pub const INVALID_ACTION_KIND: &str = "INVALID_ACTION_KIND";
/// A window effect was dictated on a run without a complete window.
pub const NO_SCHEDULE_WINDOW: &str = "NO_SCHEDULE_WINDOW";

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Broad classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape, rejected before any state change.
    Validation,
    /// State machine violation.
    Precondition,
    /// Business-rule cap.
    Limit,
    /// Another operation already established the invariant.
    Conflict,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Precondition => "precondition",
            Self::Limit => "limit",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

// ---------------------------------------------------------------------------
// CoreError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid input ({code}): {message}")]
    InvalidInput { code: &'static str, message: String },

    #[error("Precondition failed ({code}): {message}")]
    Precondition { code: &'static str, message: String },

    #[error("Limit exceeded ({code}): {message}")]
    LimitExceeded { code: &'static str, message: String },

    #[error("Conflict ({code}): {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn precondition(code: &'static str, message: impl Into<String>) -> Self {
        Self::Precondition {
            code,
            message: message.into(),
        }
    }

    pub fn limit(code: &'static str, message: impl Into<String>) -> Self {
        Self::LimitExceeded {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Stable machine-readable code returned to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => NOT_FOUND,
            Self::Validation(_) => VALIDATION_ERROR,
            Self::InvalidInput { code, .. }
            | Self::Precondition { code, .. }
            | Self::LimitExceeded { code, .. }
            | Self::Conflict { code, .. } => code,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) | Self::InvalidInput { .. } => ErrorKind::Validation,
            Self::Precondition { .. } => ErrorKind::Precondition,
            Self::LimitExceeded { .. } => ErrorKind::Limit,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Caller-facing message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound { entity, id } => format!("{entity} with id {id} not found"),
            Self::Validation(msg) | Self::Internal(msg) => msg.clone(),
            Self::InvalidInput { message, .. }
            | Self::Precondition { message, .. }
            | Self::LimitExceeded { message, .. }
            | Self::Conflict { message, .. } => message.clone(),
        }
    }
}
