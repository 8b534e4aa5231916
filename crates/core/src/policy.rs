//! Business policy knobs for the coordination engine.
//!
//! These are policy, not mechanism: the API layer loads them from the
//! environment at startup and hands a shared copy to every operation.

use serde::Serialize;

/// Default maximum number of request ids accepted by one attach call.
pub const DEFAULT_ATTACH_BATCH_LIMIT: usize = 10;

/// Default cap on proposed/countered events per negotiation thread.
pub const DEFAULT_PROPOSAL_TURN_CAP: i64 = 3;

/// Default age (days since opt-in) after which an attachment counts as stale.
pub const DEFAULT_DRIFT_AGE_THRESHOLD_DAYS: i64 = 30;

/// Minimum sample before a coverage percentage is reported.
pub const DEFAULT_COVERAGE_MIN_SAMPLE: i64 = 30;

/// Coverage percentage considered on target.
pub const DEFAULT_COVERAGE_TARGET_PCT: f64 = 80.0;

/// Signals below this severity never produce a finding.
pub const DEFAULT_RISK_FINDING_FLOOR: f64 = 0.35;

#[derive(Debug, Clone, Serialize)]
pub struct CoordinationPolicy {
    pub attach_batch_limit: usize,
    pub proposal_turn_cap: i64,
    /// Whether a stakeholder may open a negotiation thread.
    pub stakeholder_may_initiate: bool,
    pub drift_age_threshold_days: i64,
    pub coverage_min_sample: i64,
    pub coverage_target_pct: f64,
    pub risk_finding_floor: f64,
}

impl Default for CoordinationPolicy {
    fn default() -> Self {
        Self {
            attach_batch_limit: DEFAULT_ATTACH_BATCH_LIMIT,
            proposal_turn_cap: DEFAULT_PROPOSAL_TURN_CAP,
            stakeholder_may_initiate: true,
            drift_age_threshold_days: DEFAULT_DRIFT_AGE_THRESHOLD_DAYS,
            coverage_min_sample: DEFAULT_COVERAGE_MIN_SAMPLE,
            coverage_target_pct: DEFAULT_COVERAGE_TARGET_PCT,
            risk_finding_floor: DEFAULT_RISK_FINDING_FLOOR,
        }
    }
}

impl CoordinationPolicy {
    /// Check that the configured values are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.attach_batch_limit == 0 {
            return Err("attach_batch_limit must be at least 1".to_string());
        }
        if self.proposal_turn_cap < 1 {
            return Err("proposal_turn_cap must be at least 1".to_string());
        }
        if self.drift_age_threshold_days < 1 {
            return Err("drift_age_threshold_days must be at least 1".to_string());
        }
        if self.coverage_min_sample < 0 {
            return Err("coverage_min_sample must not be negative".to_string());
        }
        if !(0.0..=100.0).contains(&self.coverage_target_pct) {
            return Err("coverage_target_pct must be between 0 and 100".to_string());
        }
        if !(0.0..=1.0).contains(&self.risk_finding_floor) {
            return Err("risk_finding_floor must be between 0 and 1".to_string());
        }
        Ok(())
    }
}
