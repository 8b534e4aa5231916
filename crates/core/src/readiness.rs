//! Run readiness summary and coverage measurement.
//!
//! The summary is what a snapshot freezes and what eligibility later
//! diffs against. Coverage refuses to report a percentage until enough
//! items exist, so small samples never show a misleadingly low figure.

use serde::{Deserialize, Serialize};

use crate::drift::{self, AttachedRequestView, DriftCounts};
use crate::policy::CoordinationPolicy;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Coverage {
    /// Fewer than `min_sample` items; no percentage is reported.
    NotYetMeasurable {
        actual: i64,
        expected: i64,
        min_sample: i64,
    },
    Measured {
        actual: i64,
        expected: i64,
        pct: f64,
        meets_target: bool,
    },
}

impl Coverage {
    pub fn is_measurable(&self) -> bool {
        matches!(self, Self::Measured { .. })
    }
}

/// Compute coverage of `actual` against `expected`.
///
/// Below `min_sample` actual items the result is `NotYetMeasurable`.
/// The percentage is rounded to one decimal and capped at 100.
pub fn compute_coverage(actual: i64, expected: i64, min_sample: i64, target_pct: f64) -> Coverage {
    if actual < min_sample || expected <= 0 {
        return Coverage::NotYetMeasurable {
            actual,
            expected,
            min_sample,
        };
    }
    let raw = actual as f64 / expected as f64 * 100.0;
    let pct = ((raw * 10.0).round() / 10.0).min(100.0);
    Coverage::Measured {
        actual,
        expected,
        pct,
        meets_target: pct >= target_pct,
    }
}

// ---------------------------------------------------------------------------
// ReadinessSummary
// ---------------------------------------------------------------------------

/// Point-in-time readiness figures for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSummary {
    pub attached_count: i64,
    /// Attached requests that are opted in and active.
    pub coord_ready_count: i64,
    pub drift: DriftCounts,
    pub coverage: Coverage,
}

/// Build the summary from the run's attachments as they are right now.
///
/// `expected_request_count` is the run's planning target; when absent the
/// attached count stands in for it.
pub fn summarize(
    run_zone_id: Option<DbId>,
    expected_request_count: Option<i64>,
    views: &[AttachedRequestView],
    now: Timestamp,
    policy: &CoordinationPolicy,
) -> ReadinessSummary {
    let attached_count = views.len() as i64;
    let coord_ready_count = views
        .iter()
        .filter(|v| drift::is_coordination_ready(&v.current))
        .count() as i64;
    let (_, drift_counts) =
        drift::compute_drift(run_zone_id, views, now, policy.drift_age_threshold_days);
    let expected = expected_request_count.unwrap_or(attached_count);
    let coverage = compute_coverage(
        coord_ready_count,
        expected,
        policy.coverage_min_sample,
        policy.coverage_target_pct,
    );
    ReadinessSummary {
        attached_count,
        coord_ready_count,
        drift: drift_counts,
        coverage,
    }
}
