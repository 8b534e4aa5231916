//! Risk scoring, replan bundle options and operator action kinds.
//!
//! A run's segments carry signals from external feeds. Each evaluation
//! pass scores those signals, emits one finding per significant signal,
//! and proposes mitigations. The database layer turns the result into a
//! replan bundle.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, INVALID_ACTION_KIND, NO_SCHEDULE_WINDOW};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const BAND_THRESHOLD_CRITICAL: f64 = 0.85;
pub const BAND_THRESHOLD_HIGH: f64 = 0.60;
pub const BAND_THRESHOLD_MEDIUM: f64 = 0.35;

pub const BUNDLE_STATUS_OPEN: &str = "open";
pub const BUNDLE_STATUS_ACTIONED: &str = "actioned";
pub const BUNDLE_STATUS_DISMISSED: &str = "dismissed";

pub const ACTION_SUGGEST: &str = "suggest";
pub const ACTION_REQUEST: &str = "request";
pub const ACTION_DICTATE: &str = "dictate";

pub const VALID_ACTION_KINDS: &[&str] = &[ACTION_SUGGEST, ACTION_REQUEST, ACTION_DICTATE];

pub const SEGMENT_STATUS_ACTIVE: &str = "active";
pub const SEGMENT_STATUS_HELD: &str = "held";

pub const SIGNAL_WEATHER: &str = "weather";
pub const SIGNAL_ACCESS: &str = "access";
pub const SIGNAL_TRAFFIC: &str = "traffic";
pub const SIGNAL_CREW: &str = "crew";
pub const SIGNAL_SUPPLY: &str = "supply";

pub const VALID_SIGNAL_TYPES: &[&str] = &[
    SIGNAL_WEATHER,
    SIGNAL_ACCESS,
    SIGNAL_TRAFFIC,
    SIGNAL_CREW,
    SIGNAL_SUPPLY,
];

// ---------------------------------------------------------------------------
// RiskBand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score >= BAND_THRESHOLD_CRITICAL {
            Self::Critical
        } else if score >= BAND_THRESHOLD_HIGH {
            Self::High
        } else if score >= BAND_THRESHOLD_MEDIUM {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// How long until the run should be re-evaluated.
    pub fn recheck_after(&self) -> Duration {
        match self {
            Self::Critical => Duration::minutes(15),
            Self::High => Duration::minutes(60),
            Self::Medium => Duration::minutes(240),
            Self::Low => Duration::minutes(720),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Weather,
    Access,
    Traffic,
    Crew,
    Supply,
}

impl SignalType {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            SIGNAL_WEATHER => Ok(Self::Weather),
            SIGNAL_ACCESS => Ok(Self::Access),
            SIGNAL_TRAFFIC => Ok(Self::Traffic),
            SIGNAL_CREW => Ok(Self::Crew),
            SIGNAL_SUPPLY => Ok(Self::Supply),
            _ => Err(CoreError::Validation(format!(
                "Invalid signal type '{s}'. Must be one of: {}",
                VALID_SIGNAL_TYPES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => SIGNAL_WEATHER,
            Self::Access => SIGNAL_ACCESS,
            Self::Traffic => SIGNAL_TRAFFIC,
            Self::Crew => SIGNAL_CREW,
            Self::Supply => SIGNAL_SUPPLY,
        }
    }
}

pub fn validate_severity(severity: f64) -> Result<(), CoreError> {
    if (0.0..=1.0).contains(&severity) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Signal severity must be between 0 and 1, got {severity}"
        )))
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Advisory only; recorded with no state change.
    Suggest,
    /// Recorded; stakeholder confirmation happens outside the engine.
    Request,
    /// Applies the option's effect and closes the bundle.
    Dictate,
}

impl ActionKind {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            ACTION_SUGGEST => Ok(Self::Suggest),
            ACTION_REQUEST => Ok(Self::Request),
            ACTION_DICTATE => Ok(Self::Dictate),
            _ => Err(CoreError::InvalidInput {
                code: INVALID_ACTION_KIND,
                message: format!(
                    "Invalid action kind '{s}'. Must be one of: {}",
                    VALID_ACTION_KINDS.join(", ")
                ),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suggest => ACTION_SUGGEST,
            Self::Request => ACTION_REQUEST,
            Self::Dictate => ACTION_DICTATE,
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What a replan option does when dictated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OptionEffect {
    /// Move the whole scheduling window later.
    ShiftWindow { minutes: i64 },
    /// Push the window end later.
    ExtendWindow { minutes: i64 },
    /// Put a segment on hold.
    HoldSegment { segment_id: DbId },
    /// No state change.
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDraft {
    pub description: String,
    pub effect: OptionEffect,
}

/// Apply a window effect to a run's scheduling window.
///
/// Returns `None` for effects that do not touch the window.
pub fn apply_window_effect(
    effect: &OptionEffect,
    starts_at: Option<Timestamp>,
    ends_at: Option<Timestamp>,
) -> Result<Option<(Timestamp, Timestamp)>, CoreError> {
    let delta = match effect {
        OptionEffect::ShiftWindow { minutes } | OptionEffect::ExtendWindow { minutes } => {
            Duration::minutes(*minutes)
        }
        OptionEffect::HoldSegment { .. } | OptionEffect::Advisory => return Ok(None),
    };
    let (Some(start), Some(end)) = (starts_at, ends_at) else {
        return Err(CoreError::precondition(
            NO_SCHEDULE_WINDOW,
            "Run has no complete scheduling window to adjust",
        ));
    };
    Ok(Some(match effect {
        OptionEffect::ShiftWindow { .. } => (start + delta, end + delta),
        _ => (start, end + delta),
    }))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SignalInput {
    pub signal_id: DbId,
    pub signal_type: SignalType,
    pub severity: f64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SegmentInput {
    pub segment_id: DbId,
    pub label: String,
    pub signals: Vec<SignalInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub segment_id: DbId,
    pub signal_id: DbId,
    pub signal_type: SignalType,
    pub severity: f64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RiskEvaluation {
    pub score: f64,
    pub band: RiskBand,
    pub findings: Vec<Finding>,
    pub options: Vec<OptionDraft>,
}

/// Combine independent signal severities on one segment (noisy-OR).
pub fn segment_score(severities: &[f64]) -> f64 {
    let survive: f64 = severities
        .iter()
        .map(|s| 1.0 - s.clamp(0.0, 1.0))
        .product();
    (1.0 - survive).clamp(0.0, 1.0)
}

/// Score every segment and build findings and mitigation options.
///
/// The run score is the worst segment score.
pub fn evaluate(segments: &[SegmentInput], finding_floor: f64) -> RiskEvaluation {
    let score = segments
        .iter()
        .map(|seg| {
            let severities: Vec<f64> = seg.signals.iter().map(|s| s.severity).collect();
            segment_score(&severities)
        })
        .fold(0.0_f64, f64::max);

    let findings: Vec<Finding> = segments
        .iter()
        .flat_map(|seg| {
            seg.signals
                .iter()
                .filter(|s| s.severity >= finding_floor)
                .map(|s| Finding {
                    segment_id: seg.segment_id,
                    signal_id: s.signal_id,
                    signal_type: s.signal_type,
                    severity: s.severity,
                    detail: s.detail.clone(),
                })
        })
        .collect();

    let options = propose_options(segments, &findings);

    RiskEvaluation {
        score,
        band: RiskBand::from_score(score),
        findings,
        options,
    }
}

/// Mitigations for a set of findings, without duplicate effects.
///
/// A trailing advisory option is always present when there is at least
/// one finding.
pub fn propose_options(segments: &[SegmentInput], findings: &[Finding]) -> Vec<OptionDraft> {
    let mut options: Vec<OptionDraft> = Vec::new();
    for finding in findings {
        let label = segments
            .iter()
            .find(|s| s.segment_id == finding.segment_id)
            .map(|s| s.label.as_str())
            .unwrap_or("segment");
        let draft = match finding.signal_type {
            SignalType::Weather => {
                let minutes = if finding.severity >= BAND_THRESHOLD_CRITICAL {
                    1440
                } else {
                    120
                };
                OptionDraft {
                    description: format!(
                        "Shift the run {} to avoid weather on {label}",
                        describe_minutes(minutes)
                    ),
                    effect: OptionEffect::ShiftWindow { minutes },
                }
            }
            SignalType::Traffic => {
                let minutes = if finding.severity >= BAND_THRESHOLD_HIGH {
                    60
                } else {
                    30
                };
                OptionDraft {
                    description: format!(
                        "Extend the window by {} for traffic on {label}",
                        describe_minutes(minutes)
                    ),
                    effect: OptionEffect::ExtendWindow { minutes },
                }
            }
            SignalType::Access => OptionDraft {
                description: format!("Hold {label} until access is confirmed"),
                effect: OptionEffect::HoldSegment {
                    segment_id: finding.segment_id,
                },
            },
            SignalType::Crew => OptionDraft {
                description: format!("Shift the run 4 hours to cover crew gaps on {label}"),
                effect: OptionEffect::ShiftWindow { minutes: 240 },
            },
            SignalType::Supply => OptionDraft {
                description: format!("Shift the run one day for supply delays on {label}"),
                effect: OptionEffect::ShiftWindow { minutes: 1440 },
            },
        };
        if !options.iter().any(|o| o.effect == draft.effect) {
            options.push(draft);
        }
    }
    if !findings.is_empty() {
        options.push(OptionDraft {
            description: "Proceed as planned and keep monitoring".to_string(),
            effect: OptionEffect::Advisory,
        });
    }
    options
}

fn describe_minutes(minutes: i64) -> String {
    if minutes % 1440 == 0 {
        let days = minutes / 1440;
        if days == 1 {
            "one day".to_string()
        } else {
            format!("{days} days")
        }
    } else if minutes % 60 == 0 {
        format!("{} hours", minutes / 60)
    } else {
        format!("{minutes} minutes")
    }
}
