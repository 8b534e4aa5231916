//! Readiness snapshot and execution handoff models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use n3_core::drift::{DriftCounts, RequestDrift};
use n3_core::readiness::ReadinessSummary;
use n3_core::types::{DbId, Timestamp};

/// A row from the `readiness_snapshots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReadinessSnapshot {
    pub id: DbId,
    pub run_id: DbId,
    pub locked_at: Timestamp,
    pub note: Option<String>,
    pub payload: serde_json::Value,
}

/// A row from the `execution_handoffs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExecutionHandoff {
    pub id: DbId,
    pub run_id: DbId,
    pub note: Option<String>,
    pub eligibility: serde_json::Value,
    pub created_at: Timestamp,
}

/// Request body for lock and handoff creation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NoteRequest {
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// Drift report for a run.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub run_id: DbId,
    pub evaluated: bool,
    pub skipped_reason: Option<String>,
    pub evaluated_at: Timestamp,
    pub counts: DriftCounts,
    pub items: Vec<RequestDrift>,
}

/// Current readiness for a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub run_id: DbId,
    pub status: String,
    pub evaluated_at: Timestamp,
    #[serde(flatten)]
    pub summary: ReadinessSummary,
    pub is_locked: bool,
    pub has_handoff: bool,
}
