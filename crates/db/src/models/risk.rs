//! Risk monitor models: segments, signals, monitor state and replan bundles.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use n3_core::risk::OptionEffect;
use n3_core::types::{DbId, Timestamp};

/// A row from the `run_segments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunSegment {
    pub id: DbId,
    pub run_id: DbId,
    pub sequence: i32,
    pub label: String,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRunSegment {
    #[validate(range(min = 0))]
    pub sequence: i32,
    #[validate(length(min = 1, max = 200))]
    pub label: String,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
}

/// A row from the `segment_signals` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SegmentSignal {
    pub id: DbId,
    pub segment_id: DbId,
    pub signal_type: String,
    pub severity: f64,
    pub detail: Option<String>,
    pub observed_at: Timestamp,
    pub cleared_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSegmentSignal {
    pub signal_type: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub severity: f64,
    #[validate(length(max = 2000))]
    pub detail: Option<String>,
    pub observed_at: Option<Timestamp>,
}

/// A row from the `service_run_monitor_state` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonitorState {
    pub run_id: DbId,
    pub last_checked_at: Timestamp,
    pub next_check_at: Timestamp,
    pub last_risk_score: f64,
    pub last_band: String,
}

/// A row from the `replan_bundles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReplanBundle {
    pub id: DbId,
    pub run_id: DbId,
    pub status: String,
    pub findings: serde_json::Value,
    pub risk_score: f64,
    pub risk_delta: f64,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

/// A row from the `replan_options` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReplanOption {
    pub id: DbId,
    pub bundle_id: DbId,
    pub position: i32,
    pub description: String,
    pub effect: serde_json::Value,
}

impl ReplanOption {
    pub fn parsed_effect(&self) -> Result<OptionEffect, serde_json::Error> {
        serde_json::from_value(self.effect.clone())
    }
}

/// A row from the `replan_option_actions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReplanOptionAction {
    pub id: DbId,
    pub option_id: DbId,
    pub bundle_id: DbId,
    pub action_kind: String,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

/// A bundle with its options and the actions recorded against them.
#[derive(Debug, Clone, Serialize)]
pub struct BundleDetail {
    #[serde(flatten)]
    pub bundle: ReplanBundle,
    pub options: Vec<ReplanOption>,
    pub actions: Vec<ReplanOptionAction>,
}

/// Request body for `POST /replan-bundles/{id}/actions`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TakeActionRequest {
    pub option_id: DbId,
    pub action_kind: String,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub run_id: DbId,
    pub risk_score: f64,
    pub band: String,
    pub monitor: MonitorState,
    /// Bundle dismissed by this pass, if one was open.
    pub dismissed_bundle_id: Option<DbId>,
    /// New open bundle, present only when findings exist.
    pub bundle: Option<BundleDetail>,
}

/// Outcome of an operator action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action: ReplanOptionAction,
    pub bundle: ReplanBundle,
    /// Whether the option's effect was written to the run or segment.
    pub applied: bool,
}
