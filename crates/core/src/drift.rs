//! Maintenance request attachment rules and drift detection.
//!
//! Each attachment keeps a copy of the request as it looked when it was
//! attached. Drift is the set of ways the live request has diverged from
//! that copy (or from the run). It is advisory only: nothing here blocks
//! or mutates anything.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, LIMIT_EXCEEDED, NOT_ELIGIBLE};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Request status constants
// ---------------------------------------------------------------------------

pub const REQUEST_STATUS_OPEN: &str = "open";
pub const REQUEST_STATUS_SCHEDULED: &str = "scheduled";
pub const REQUEST_STATUS_IN_PROGRESS: &str = "in_progress";
pub const REQUEST_STATUS_ON_HOLD: &str = "on_hold";
pub const REQUEST_STATUS_COMPLETED: &str = "completed";
pub const REQUEST_STATUS_CANCELLED: &str = "cancelled";

/// Statuses in which a request still needs the run.
pub const ACTIVE_REQUEST_STATUSES: &[&str] = &[
    REQUEST_STATUS_OPEN,
    REQUEST_STATUS_SCHEDULED,
    REQUEST_STATUS_IN_PROGRESS,
];

pub fn is_active_status(status: &str) -> bool {
    ACTIVE_REQUEST_STATUSES.contains(&status)
}

// ---------------------------------------------------------------------------
// Drift categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftCategory {
    /// Opt-in flag flipped to false since attach.
    CoordinationOptOut,
    /// Request zone differs from the run zone, or the request is now unzoned.
    ZoneMismatch,
    /// Request status is no longer active.
    InactiveStatus,
    /// Time since opt-in exceeds the configured threshold.
    AgeExceeded,
}

impl DriftCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoordinationOptOut => "coordination_opt_out",
            Self::ZoneMismatch => "zone_mismatch",
            Self::InactiveStatus => "inactive_status",
            Self::AgeExceeded => "age_exceeded",
        }
    }
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// The fields of a maintenance request that drift detection cares about.
///
/// Used both for the copy captured at attach time and for live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestState {
    pub coordination_opt_in: bool,
    pub coordination_opt_in_at: Option<Timestamp>,
    pub status: String,
    pub zone_id: Option<DbId>,
    pub category: String,
}

/// One attachment with both its captured and current request state.
#[derive(Debug, Clone)]
pub struct AttachedRequestView {
    pub request_id: DbId,
    pub captured: RequestState,
    pub current: RequestState,
}

/// Drift found for a single attached request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDrift {
    pub request_id: DbId,
    pub categories: Vec<DriftCategory>,
}

/// Number of attached requests in each drift bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftCounts {
    #[serde(default)]
    pub coordination_opt_out: i64,
    #[serde(default)]
    pub zone_mismatch: i64,
    #[serde(default)]
    pub inactive_status: i64,
    #[serde(default)]
    pub age_exceeded: i64,
}

impl DriftCounts {
    pub fn get(&self, category: DriftCategory) -> i64 {
        match category {
            DriftCategory::CoordinationOptOut => self.coordination_opt_out,
            DriftCategory::ZoneMismatch => self.zone_mismatch,
            DriftCategory::InactiveStatus => self.inactive_status,
            DriftCategory::AgeExceeded => self.age_exceeded,
        }
    }

    fn bump(&mut self, category: DriftCategory) {
        match category {
            DriftCategory::CoordinationOptOut => self.coordination_opt_out += 1,
            DriftCategory::ZoneMismatch => self.zone_mismatch += 1,
            DriftCategory::InactiveStatus => self.inactive_status += 1,
            DriftCategory::AgeExceeded => self.age_exceeded += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.coordination_opt_out + self.zone_mismatch + self.inactive_status + self.age_exceeded
    }
}

/// All drift categories in display order.
pub const ALL_DRIFT_CATEGORIES: [DriftCategory; 4] = [
    DriftCategory::CoordinationOptOut,
    DriftCategory::ZoneMismatch,
    DriftCategory::InactiveStatus,
    DriftCategory::AgeExceeded,
];

// ---------------------------------------------------------------------------
// Attachment rules
// ---------------------------------------------------------------------------

/// Deduplicate an attach/detach batch and enforce the batch-size cap.
///
/// The cap applies to the ids supplied in this call, not to the total
/// attached to the run.
pub fn normalize_batch(request_ids: &[DbId], limit: usize) -> Result<Vec<DbId>, CoreError> {
    if request_ids.is_empty() {
        return Err(CoreError::Validation(
            "At least one request id is required".to_string(),
        ));
    }
    if request_ids.len() > limit {
        return Err(CoreError::limit(
            LIMIT_EXCEEDED,
            format!(
                "At most {limit} requests may be attached per call, got {}",
                request_ids.len()
            ),
        ));
    }
    let unique: BTreeSet<DbId> = request_ids.iter().copied().collect();
    Ok(unique.into_iter().collect())
}

/// Why a single request cannot be attached, if it can't.
pub fn ineligibility_reason(
    run_portal_id: Option<DbId>,
    run_zone_id: Option<DbId>,
    request_portal_id: DbId,
    request: &RequestState,
) -> Option<&'static str> {
    if !request.coordination_opt_in {
        return Some("not opted in to coordination");
    }
    if !is_active_status(&request.status) {
        return Some("request is not active");
    }
    match run_portal_id {
        None => return Some("run has no portal"),
        Some(portal) if portal != request_portal_id => {
            return Some("request belongs to a different portal")
        }
        Some(_) => {}
    }
    match run_zone_id {
        Some(zone) if request.zone_id != Some(zone) => Some("request is outside the run zone"),
        None if request.zone_id.is_some() => Some("run has no zone; only unzoned requests match"),
        _ => None,
    }
}

/// Fail with `NOT_ELIGIBLE` if any candidate is ineligible or missing.
///
/// `candidates` holds `(request_id, portal_id, state)` for the ids that
/// were found; ids in `requested` without a candidate are reported as
/// missing.
pub fn check_attach_eligibility(
    run_portal_id: Option<DbId>,
    run_zone_id: Option<DbId>,
    requested: &[DbId],
    candidates: &[(DbId, DbId, RequestState)],
) -> Result<(), CoreError> {
    let mut problems: Vec<String> = Vec::new();
    for id in requested {
        match candidates.iter().find(|(cid, _, _)| cid == id) {
            None => problems.push(format!("{id}: request not found")),
            Some((_, portal, state)) => {
                if let Some(reason) = ineligibility_reason(run_portal_id, run_zone_id, *portal, state)
                {
                    problems.push(format!("{id}: {reason}"));
                }
            }
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(CoreError::precondition(
            NOT_ELIGIBLE,
            format!("Requests not eligible: {}", problems.join("; ")),
        ))
    }
}

// ---------------------------------------------------------------------------
// Drift computation
// ---------------------------------------------------------------------------

/// Classify one attachment into zero or more drift categories.
pub fn classify(
    run_zone_id: Option<DbId>,
    view: &AttachedRequestView,
    now: Timestamp,
    age_threshold_days: i64,
) -> Vec<DriftCategory> {
    let mut categories = Vec::new();
    let current = &view.current;
    let captured = &view.captured;

    if captured.coordination_opt_in && !current.coordination_opt_in {
        categories.push(DriftCategory::CoordinationOptOut);
    }

    if current.zone_id != run_zone_id {
        categories.push(DriftCategory::ZoneMismatch);
    }

    if !is_active_status(&current.status) {
        categories.push(DriftCategory::InactiveStatus);
    }

    let opted_in_at = current
        .coordination_opt_in_at
        .or(captured.coordination_opt_in_at);
    if let Some(at) = opted_in_at {
        if (now - at).num_days() > age_threshold_days {
            categories.push(DriftCategory::AgeExceeded);
        }
    }

    categories
}

/// Compute per-request drift and the bucket counts for a run.
///
/// Requests without drift are omitted from the returned list.
pub fn compute_drift(
    run_zone_id: Option<DbId>,
    views: &[AttachedRequestView],
    now: Timestamp,
    age_threshold_days: i64,
) -> (Vec<RequestDrift>, DriftCounts) {
    let mut items = Vec::new();
    let mut counts = DriftCounts::default();
    for view in views {
        let categories = classify(run_zone_id, view, now, age_threshold_days);
        if categories.is_empty() {
            continue;
        }
        for c in &categories {
            counts.bump(*c);
        }
        items.push(RequestDrift {
            request_id: view.request_id,
            categories,
        });
    }
    (items, counts)
}

/// An attachment is coordination-ready when it is opted in and active.
pub fn is_coordination_ready(state: &RequestState) -> bool {
    state.coordination_opt_in && is_active_status(&state.status)
}
