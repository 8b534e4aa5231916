//! Maintenance request and attachment models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use n3_core::drift::{AttachedRequestView, RequestState};
use n3_core::types::{DbId, Timestamp};

/// A row from the `maintenance_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MaintenanceRequest {
    pub id: DbId,
    pub portal_id: DbId,
    pub zone_id: Option<DbId>,
    pub title: String,
    pub category: String,
    pub status: String,
    pub coordination_opt_in: bool,
    pub coordination_opt_in_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MaintenanceRequest {
    pub fn state(&self) -> RequestState {
        RequestState {
            coordination_opt_in: self.coordination_opt_in,
            coordination_opt_in_at: self.coordination_opt_in_at,
            status: self.status.clone(),
            zone_id: self.zone_id,
            category: self.category.clone(),
        }
    }
}

/// DTO for inserting a maintenance request. The engine never writes these
/// in production; the upstream system does.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMaintenanceRequest {
    pub portal_id: DbId,
    pub zone_id: Option<DbId>,
    pub title: String,
    pub category: String,
    pub status: Option<String>,
    pub coordination_opt_in: bool,
    pub coordination_opt_in_at: Option<Timestamp>,
}

/// An attachment joined with the request's current state.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttachedRequest {
    pub run_id: DbId,
    pub request_id: DbId,
    pub attached_at: Timestamp,
    pub captured_opt_in: bool,
    pub captured_opt_in_at: Option<Timestamp>,
    pub captured_status: String,
    pub captured_zone_id: Option<DbId>,
    pub captured_category: String,
    pub title: String,
    pub portal_id: DbId,
    pub current_opt_in: bool,
    pub current_opt_in_at: Option<Timestamp>,
    pub current_status: String,
    pub current_zone_id: Option<DbId>,
    pub current_category: String,
}

impl AttachedRequest {
    pub fn captured_state(&self) -> RequestState {
        RequestState {
            coordination_opt_in: self.captured_opt_in,
            coordination_opt_in_at: self.captured_opt_in_at,
            status: self.captured_status.clone(),
            zone_id: self.captured_zone_id,
            category: self.captured_category.clone(),
        }
    }

    pub fn current_state(&self) -> RequestState {
        RequestState {
            coordination_opt_in: self.current_opt_in,
            coordination_opt_in_at: self.current_opt_in_at,
            status: self.current_status.clone(),
            zone_id: self.current_zone_id,
            category: self.current_category.clone(),
        }
    }

    pub fn view(&self) -> AttachedRequestView {
        AttachedRequestView {
            request_id: self.request_id,
            captured: self.captured_state(),
            current: self.current_state(),
        }
    }
}

/// Query parameters for `GET /service-runs/{id}/eligible-requests`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EligibleRequestParams {
    pub category: Option<String>,
    #[serde(default)]
    pub include_unzoned: bool,
    #[serde(default)]
    pub include_attached: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for attach and detach.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentBatch {
    pub request_ids: Vec<DbId>,
}

/// Result of an attach call.
#[derive(Debug, Clone, Serialize)]
pub struct AttachResult {
    pub run_id: DbId,
    pub attached: Vec<DbId>,
    pub already_attached: Vec<DbId>,
}

/// Result of a detach call.
#[derive(Debug, Clone, Serialize)]
pub struct DetachResult {
    pub run_id: DbId,
    pub detached: Vec<DbId>,
}
