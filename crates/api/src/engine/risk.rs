//! Segments, signals, risk evaluation and replan bundles.

use chrono::Utc;
use sqlx::PgConnection;
use validator::Validate;

use n3_core::error::{CoreError, ALREADY_CLOSED};
use n3_core::lifecycle::validate_window;
use n3_core::pagination::{clamp_limit, clamp_offset};
use n3_core::risk::{
    self, apply_window_effect, ActionKind, OptionEffect, SegmentInput, SignalInput, SignalType,
    BUNDLE_STATUS_ACTIONED, BUNDLE_STATUS_DISMISSED, BUNDLE_STATUS_OPEN, SEGMENT_STATUS_ACTIVE,
    SEGMENT_STATUS_HELD,
};
use n3_core::types::DbId;
use n3_db::models::risk::{
    ActionResult, BundleDetail, CreateRunSegment, CreateSegmentSignal, EvaluationResult,
    MonitorState, ReplanBundle, RunSegment, SegmentSignal, TakeActionRequest,
};
use n3_db::repositories::{MonitorStateRepo, ReplanBundleRepo, SegmentRepo, ServiceRunRepo};
use n3_events::bus::{
    REPLAN_ACTION_RECORDED, REPLAN_BUNDLE_ACTIONED, REPLAN_BUNDLE_DISMISSED,
    REPLAN_BUNDLE_OPENED, RISK_EVALUATED, SEGMENT_CREATED, SIGNAL_CLEARED, SIGNAL_RECORDED,
};
use n3_events::CoordinationEvent;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::{begin_for_run, begin_read, load_run, not_found, payload, publish_all};

// ---------------------------------------------------------------------------
// Segments and signals
// ---------------------------------------------------------------------------

pub async fn create_segment(
    state: &AppState,
    run_id: DbId,
    input: CreateRunSegment,
) -> AppResult<RunSegment> {
    input.validate()?;
    validate_window(input.starts_at, input.ends_at)?;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    load_run(&mut tx, run_id).await?;
    let segment = SegmentRepo::create(&mut *tx, run_id, &input).await?;
    tx.commit().await?;

    publish_all(
        state,
        vec![CoordinationEvent::for_run(SEGMENT_CREATED, run_id).with_payload(payload(&segment))],
    );
    Ok(segment)
}

pub async fn list_segments(state: &AppState, run_id: DbId) -> AppResult<Vec<RunSegment>> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let segments = SegmentRepo::list_for_run(&mut *tx, run_id).await?;
    tx.commit().await?;
    Ok(segments)
}

pub async fn record_signal(
    state: &AppState,
    segment_id: DbId,
    input: CreateSegmentSignal,
) -> AppResult<SegmentSignal> {
    input.validate()?;
    SignalType::from_str_value(&input.signal_type)?;
    risk::validate_severity(input.severity)?;

    let run_id = segment_run(state, segment_id).await?;
    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let signal = SegmentRepo::create_signal(&mut *tx, segment_id, &input).await?;
    tx.commit().await?;

    tracing::info!(run_id, segment_id, signal_id = signal.id, signal_type = %signal.signal_type, "Signal recorded");
    publish_all(
        state,
        vec![CoordinationEvent::for_run(SIGNAL_RECORDED, run_id).with_payload(payload(&signal))],
    );
    Ok(signal)
}

/// Mark a signal as cleared. Clearing twice keeps the first timestamp.
pub async fn clear_signal(state: &AppState, signal_id: DbId) -> AppResult<SegmentSignal> {
    let existing = SegmentRepo::find_signal(&state.pool, signal_id)
        .await?
        .ok_or_else(|| not_found("SegmentSignal", signal_id))?;
    let run_id = segment_run(state, existing.segment_id).await?;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let signal = SegmentRepo::clear_signal(&mut *tx, signal_id)
        .await?
        .ok_or_else(|| not_found("SegmentSignal", signal_id))?;
    tx.commit().await?;

    publish_all(
        state,
        vec![CoordinationEvent::for_run(SIGNAL_CLEARED, run_id).with_payload(payload(&signal))],
    );
    Ok(signal)
}

async fn segment_run(state: &AppState, segment_id: DbId) -> AppResult<DbId> {
    let segment = SegmentRepo::find_by_id(&state.pool, segment_id)
        .await?
        .ok_or_else(|| not_found("RunSegment", segment_id))?;
    Ok(segment.run_id)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Score the run from its open signals and replace the open bundle.
///
/// Any open bundle is dismissed; a new one is opened only when there are
/// findings. The monitor state records the score and the next check time.
pub async fn trigger_evaluation(state: &AppState, run_id: DbId) -> AppResult<EvaluationResult> {
    let mut tx = begin_for_run(&state.pool, run_id).await?;
    load_run(&mut tx, run_id).await?;

    let segments = SegmentRepo::list_for_run(&mut *tx, run_id).await?;
    let signals = SegmentRepo::list_open_signals_for_run(&mut *tx, run_id).await?;
    let inputs = segment_inputs(&segments, &signals);
    let evaluation = risk::evaluate(&inputs, state.policy.risk_finding_floor);

    let previous = MonitorStateRepo::find(&mut *tx, run_id).await?;
    let risk_delta = evaluation.score - previous.map(|m| m.last_risk_score).unwrap_or(0.0);

    let dismissed_bundle_id = match ReplanBundleRepo::find_open_for_run(&mut *tx, run_id).await? {
        Some(open) => ReplanBundleRepo::close(&mut *tx, open.id, BUNDLE_STATUS_DISMISSED)
            .await?
            .map(|b| b.id),
        None => None,
    };

    let bundle = if evaluation.findings.is_empty() {
        None
    } else {
        let findings = serde_json::to_value(&evaluation.findings)
            .map_err(|e| AppError::InternalError(format!("Failed to encode findings: {e}")))?;
        let (bundle, options) = ReplanBundleRepo::create_with_options(
            &mut tx,
            run_id,
            &findings,
            evaluation.score,
            risk_delta,
            &evaluation.options,
        )
        .await?;
        Some(BundleDetail {
            bundle,
            options,
            actions: Vec::new(),
        })
    };

    let now = Utc::now();
    let monitor = MonitorStateRepo::upsert(
        &mut *tx,
        run_id,
        now,
        now + evaluation.band.recheck_after(),
        evaluation.score,
        evaluation.band.as_str(),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        run_id,
        score = evaluation.score,
        band = evaluation.band.as_str(),
        findings = evaluation.findings.len(),
        "Risk evaluated"
    );

    let mut events = vec![CoordinationEvent::for_run(RISK_EVALUATED, run_id).with_payload(
        serde_json::json!({
            "risk_score": evaluation.score,
            "band": evaluation.band,
            "risk_delta": risk_delta,
        }),
    )];
    if let Some(id) = dismissed_bundle_id {
        events.push(
            CoordinationEvent::for_run(REPLAN_BUNDLE_DISMISSED, run_id)
                .with_payload(serde_json::json!({ "bundle_id": id })),
        );
    }
    if let Some(detail) = &bundle {
        events.push(
            CoordinationEvent::for_run(REPLAN_BUNDLE_OPENED, run_id)
                .with_payload(serde_json::json!({ "bundle_id": detail.bundle.id })),
        );
    }
    publish_all(state, events);

    Ok(EvaluationResult {
        run_id,
        risk_score: evaluation.score,
        band: evaluation.band.as_str().to_string(),
        monitor,
        dismissed_bundle_id,
        bundle,
    })
}

/// Group open signals under the active segments they belong to.
fn segment_inputs(segments: &[RunSegment], signals: &[SegmentSignal]) -> Vec<SegmentInput> {
    segments
        .iter()
        .filter(|s| s.status == SEGMENT_STATUS_ACTIVE)
        .map(|segment| SegmentInput {
            segment_id: segment.id,
            label: segment.label.clone(),
            signals: signals
                .iter()
                .filter(|sig| sig.segment_id == segment.id)
                .filter_map(|sig| {
                    let signal_type = SignalType::from_str_value(&sig.signal_type).ok()?;
                    Some(SignalInput {
                        signal_id: sig.id,
                        signal_type,
                        severity: sig.severity,
                        detail: sig.detail.clone(),
                    })
                })
                .collect(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

async fn detail(conn: &mut PgConnection, bundle: ReplanBundle) -> AppResult<BundleDetail> {
    let options = ReplanBundleRepo::list_options(&mut *conn, bundle.id).await?;
    let actions = ReplanBundleRepo::list_actions(&mut *conn, bundle.id).await?;
    Ok(BundleDetail {
        bundle,
        options,
        actions,
    })
}

pub async fn get_bundle(state: &AppState, bundle_id: DbId) -> AppResult<BundleDetail> {
    let mut tx = begin_read(&state.pool).await?;
    let bundle = ReplanBundleRepo::find_by_id(&mut *tx, bundle_id)
        .await?
        .ok_or_else(|| not_found("ReplanBundle", bundle_id))?;
    let detail = detail(&mut tx, bundle).await?;
    tx.commit().await?;
    Ok(detail)
}

pub async fn get_open_bundle(state: &AppState, run_id: DbId) -> AppResult<Option<BundleDetail>> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let result = match ReplanBundleRepo::find_open_for_run(&mut *tx, run_id).await? {
        Some(bundle) => Some(detail(&mut tx, bundle).await?),
        None => None,
    };
    tx.commit().await?;
    Ok(result)
}

pub async fn list_bundles(
    state: &AppState,
    run_id: DbId,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<ReplanBundle>> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let bundles = ReplanBundleRepo::list_for_run(
        &mut *tx,
        run_id,
        clamp_limit(limit, 25, 100),
        clamp_offset(offset),
    )
    .await?;
    tx.commit().await?;
    Ok(bundles)
}

pub async fn monitor_state(state: &AppState, run_id: DbId) -> AppResult<Option<MonitorState>> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let monitor = MonitorStateRepo::find(&mut *tx, run_id).await?;
    tx.commit().await?;
    Ok(monitor)
}

/// Record an action on one option of an open bundle.
///
/// `suggest` and `request` only record. `dictate` applies the option's
/// effect and closes the bundle as actioned.
pub async fn take_action(
    state: &AppState,
    bundle_id: DbId,
    input: TakeActionRequest,
) -> AppResult<ActionResult> {
    let kind = ActionKind::parse(&input.action_kind)?;
    input.validate()?;

    let run_id = ReplanBundleRepo::find_by_id(&state.pool, bundle_id)
        .await?
        .ok_or_else(|| not_found("ReplanBundle", bundle_id))?
        .run_id;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let bundle = ReplanBundleRepo::find_by_id(&mut *tx, bundle_id)
        .await?
        .ok_or_else(|| not_found("ReplanBundle", bundle_id))?;
    ensure_open(&bundle)?;

    let option = ReplanBundleRepo::find_option(&mut *tx, bundle_id, input.option_id)
        .await?
        .ok_or_else(|| not_found("ReplanOption", input.option_id))?;

    let action = ReplanBundleRepo::record_action(
        &mut *tx,
        bundle_id,
        option.id,
        kind.as_str(),
        input.note.as_deref(),
    )
    .await?;

    let (bundle, applied) = if kind == ActionKind::Dictate {
        let effect = option.parsed_effect().map_err(|e| {
            AppError::InternalError(format!("Option {} has an unreadable effect: {e}", option.id))
        })?;
        let applied = apply_effect(&mut tx, run_id, &effect).await?;
        let closed = ReplanBundleRepo::close(&mut *tx, bundle_id, BUNDLE_STATUS_ACTIONED)
            .await?
            .ok_or_else(|| already_closed(bundle_id))?;
        (closed, applied)
    } else {
        (bundle, false)
    };
    tx.commit().await?;

    tracing::info!(run_id, bundle_id, option_id = option.id, kind = kind.as_str(), applied, "Replan action recorded");
    let mut events = vec![CoordinationEvent::for_run(REPLAN_ACTION_RECORDED, run_id)
        .with_payload(payload(&action))];
    if bundle.status == BUNDLE_STATUS_ACTIONED {
        events.push(
            CoordinationEvent::for_run(REPLAN_BUNDLE_ACTIONED, run_id)
                .with_payload(serde_json::json!({ "bundle_id": bundle_id, "option_id": option.id })),
        );
    }
    publish_all(state, events);

    Ok(ActionResult {
        action,
        bundle,
        applied,
    })
}

/// Apply a dictated effect. Returns whether any state changed.
async fn apply_effect(conn: &mut PgConnection, run_id: DbId, effect: &OptionEffect) -> AppResult<bool> {
    match effect {
        OptionEffect::HoldSegment { segment_id } => {
            SegmentRepo::set_status(&mut *conn, run_id, *segment_id, SEGMENT_STATUS_HELD)
                .await?
                .ok_or_else(|| not_found("RunSegment", *segment_id))?;
            Ok(true)
        }
        OptionEffect::Advisory => Ok(false),
        window_effect => {
            let run = load_run(&mut *conn, run_id).await?;
            match apply_window_effect(window_effect, run.starts_at, run.ends_at)? {
                Some((starts_at, ends_at)) => {
                    ServiceRunRepo::set_window(&mut *conn, run_id, starts_at, ends_at).await?;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}

pub async fn dismiss(state: &AppState, bundle_id: DbId) -> AppResult<ReplanBundle> {
    let run_id = ReplanBundleRepo::find_by_id(&state.pool, bundle_id)
        .await?
        .ok_or_else(|| not_found("ReplanBundle", bundle_id))?
        .run_id;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let bundle = ReplanBundleRepo::close(&mut *tx, bundle_id, BUNDLE_STATUS_DISMISSED)
        .await?
        .ok_or_else(|| already_closed(bundle_id))?;
    tx.commit().await?;

    tracing::info!(run_id, bundle_id, "Replan bundle dismissed");
    publish_all(
        state,
        vec![CoordinationEvent::for_run(REPLAN_BUNDLE_DISMISSED, run_id)
            .with_payload(serde_json::json!({ "bundle_id": bundle_id }))],
    );
    Ok(bundle)
}

fn ensure_open(bundle: &ReplanBundle) -> AppResult<()> {
    if bundle.status == BUNDLE_STATUS_OPEN {
        Ok(())
    } else {
        Err(already_closed(bundle.id))
    }
}

fn already_closed(bundle_id: DbId) -> AppError {
    CoreError::conflict(
        ALREADY_CLOSED,
        format!("Replan bundle {bundle_id} is no longer open"),
    )
    .into()
}
