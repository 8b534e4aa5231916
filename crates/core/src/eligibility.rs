//! Execution eligibility: current readiness diffed against the snapshot.
//!
//! Every delta is `now - at_lock`. For counts of attached and
//! coordination-ready requests a negative delta is a regression; for drift
//! buckets a positive delta is (more problems than at lock).

use serde::{Deserialize, Serialize};

use crate::drift::{DriftCategory, ALL_DRIFT_CATEGORIES};
use crate::readiness::ReadinessSummary;
use crate::types::{DbId, Timestamp};

pub const OVERALL_UNCHANGED: &str = "unchanged";
pub const OVERALL_IMPROVED: &str = "improved";
pub const OVERALL_DEGRADED: &str = "degraded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityOverall {
    Unchanged,
    Improved,
    Degraded,
}

impl EligibilityOverall {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => OVERALL_UNCHANGED,
            Self::Improved => OVERALL_IMPROVED,
            Self::Degraded => OVERALL_DEGRADED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationDelta {
    pub attached_count_at_lock: i64,
    pub attached_count_now: i64,
    pub attached_count_delta: i64,
    pub coord_ready_count_at_lock: i64,
    pub coord_ready_count_now: i64,
    pub coord_ready_count_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDelta {
    pub category: DriftCategory,
    pub at_lock: i64,
    pub now: i64,
    pub delta: i64,
}

/// Result of comparing current readiness to the locked snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEligibility {
    pub run_id: DbId,
    pub locked_at: Timestamp,
    pub evaluated_at: Timestamp,
    pub overall: EligibilityOverall,
    pub coordination: CoordinationDelta,
    pub drift: Vec<CategoryDelta>,
}

/// Classify the change between the snapshot summary and the current one.
pub fn compare(
    at_lock: &ReadinessSummary,
    now: &ReadinessSummary,
) -> (EligibilityOverall, CoordinationDelta, Vec<CategoryDelta>) {
    let coordination = CoordinationDelta {
        attached_count_at_lock: at_lock.attached_count,
        attached_count_now: now.attached_count,
        attached_count_delta: now.attached_count - at_lock.attached_count,
        coord_ready_count_at_lock: at_lock.coord_ready_count,
        coord_ready_count_now: now.coord_ready_count,
        coord_ready_count_delta: now.coord_ready_count - at_lock.coord_ready_count,
    };

    let drift: Vec<CategoryDelta> = ALL_DRIFT_CATEGORIES
        .iter()
        .map(|&category| {
            let before = at_lock.drift.get(category);
            let after = now.drift.get(category);
            CategoryDelta {
                category,
                at_lock: before,
                now: after,
                delta: after - before,
            }
        })
        .collect();

    let degraded = coordination.attached_count_delta < 0
        || coordination.coord_ready_count_delta < 0
        || drift.iter().any(|d| d.delta > 0);
    let improved = coordination.attached_count_delta > 0
        || coordination.coord_ready_count_delta > 0
        || drift.iter().any(|d| d.delta < 0);

    let overall = if degraded {
        EligibilityOverall::Degraded
    } else if improved {
        EligibilityOverall::Improved
    } else {
        EligibilityOverall::Unchanged
    };

    (overall, coordination, drift)
}

/// Build the full eligibility record.
pub fn evaluate(
    run_id: DbId,
    locked_at: Timestamp,
    at_lock: &ReadinessSummary,
    now_summary: &ReadinessSummary,
    evaluated_at: Timestamp,
) -> ExecutionEligibility {
    let (overall, coordination, drift) = compare(at_lock, now_summary);
    ExecutionEligibility {
        run_id,
        locked_at,
        evaluated_at,
        overall,
        coordination,
        drift,
    }
}
