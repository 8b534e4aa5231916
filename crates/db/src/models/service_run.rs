//! Service run models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use n3_core::types::{DbId, Timestamp};

/// A row from the `service_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ServiceRun {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub portal_id: Option<DbId>,
    pub zone_id: Option<DbId>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub expected_request_count: Option<i64>,
    /// Pricing estimate reference, stored and returned as-is.
    pub estimate_ref: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `service_run_status_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusHistoryEntry {
    pub id: DbId,
    pub run_id: DbId,
    pub from_status: Option<String>,
    pub to_status: String,
    pub note: Option<String>,
    pub changed_at: Timestamp,
}

/// DTO for creating a new service run. New runs always start in draft.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateServiceRun {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub portal_id: Option<DbId>,
    pub zone_id: Option<DbId>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    #[validate(range(min = 0))]
    pub expected_request_count: Option<i64>,
    pub estimate_ref: Option<serde_json::Value>,
}

/// DTO for updating a run's descriptive fields and window.
///
/// Location is changed through [`SetLocation`] so the zone rule is applied
/// in one place.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateServiceRun {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    #[validate(range(min = 0))]
    pub expected_request_count: Option<i64>,
    pub estimate_ref: Option<serde_json::Value>,
}

/// Request body for `PUT /service-runs/{id}/location`.
///
/// Both fields are written as given; a null portal clears the zone.
#[derive(Debug, Clone, Deserialize)]
pub struct SetLocation {
    pub portal_id: Option<DbId>,
    pub zone_id: Option<DbId>,
}

/// Request body for promote/demote.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TransitionRequest {
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// Query parameters for `GET /service-runs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceRunListParams {
    pub status: Option<String>,
    pub portal_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
