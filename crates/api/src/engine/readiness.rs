//! Drift, readiness summary, snapshot lock, eligibility and handoff.

use chrono::Utc;
use sqlx::PgConnection;

use n3_core::drift::compute_drift;
use n3_core::eligibility::{self, ExecutionEligibility};
use n3_core::error::{CoreError, ALREADY_EXISTS, ALREADY_LOCKED, NO_SNAPSHOT};
use n3_core::lifecycle::ensure_planning_state;
use n3_core::readiness::{summarize, ReadinessSummary};
use n3_core::snapshot::{SnapshotPayload, SnapshotRequest, SnapshotRunState};
use n3_core::types::{DbId, Timestamp};
use n3_db::models::maintenance_request::AttachedRequest;
use n3_db::models::readiness::{
    DriftReport, ExecutionHandoff, ReadinessReport, ReadinessSnapshot,
};
use n3_db::models::service_run::ServiceRun;
use n3_db::repositories::{AttachmentRepo, HandoffRepo, SnapshotRepo};
use n3_events::bus::{HANDOFF_CREATED, READINESS_LOCKED, READINESS_UNLOCKED};
use n3_events::CoordinationEvent;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::{begin_for_run, begin_read, load_run, not_found, publish_all, run_status};

// ---------------------------------------------------------------------------
// Drift
// ---------------------------------------------------------------------------

/// Compare each attachment's captured state with its live state.
///
/// Skipped (with a reason) when nothing is attached or the run has left
/// planning.
pub async fn compute_run_drift(state: &AppState, run_id: DbId) -> AppResult<DriftReport> {
    let mut tx = begin_read(&state.pool).await?;
    let run = load_run(&mut tx, run_id).await?;
    let attached = AttachmentRepo::list_for_run(&mut *tx, run_id).await?;
    tx.commit().await?;

    let now = Utc::now();
    let skipped_reason = if attached.is_empty() {
        Some("Run has no attached requests".to_string())
    } else if !run_status(&run)?.is_planning() {
        Some(format!("Run is '{}'; drift is only tracked while planning", run.status))
    } else {
        None
    };

    if let Some(reason) = skipped_reason {
        return Ok(DriftReport {
            run_id,
            evaluated: false,
            skipped_reason: Some(reason),
            evaluated_at: now,
            counts: Default::default(),
            items: Vec::new(),
        });
    }

    let views: Vec<_> = attached.iter().map(AttachedRequest::view).collect();
    let (items, counts) =
        compute_drift(run.zone_id, &views, now, state.policy.drift_age_threshold_days);
    tracing::debug!(run_id, drifted = items.len(), total = counts.total(), "Drift computed");

    Ok(DriftReport {
        run_id,
        evaluated: true,
        skipped_reason: None,
        evaluated_at: now,
        counts,
        items,
    })
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

async fn current_summary(
    conn: &mut PgConnection,
    state: &AppState,
    run: &ServiceRun,
    now: Timestamp,
) -> AppResult<(Vec<AttachedRequest>, ReadinessSummary)> {
    let attached = AttachmentRepo::list_for_run(&mut *conn, run.id).await?;
    let views: Vec<_> = attached.iter().map(AttachedRequest::view).collect();
    let summary = summarize(
        run.zone_id,
        run.expected_request_count,
        &views,
        now,
        &state.policy,
    );
    Ok((attached, summary))
}

pub async fn readiness_report(state: &AppState, run_id: DbId) -> AppResult<ReadinessReport> {
    let mut tx = begin_read(&state.pool).await?;
    let run = load_run(&mut tx, run_id).await?;
    let now = Utc::now();
    let (_, summary) = current_summary(&mut tx, state, &run, now).await?;
    let is_locked = SnapshotRepo::find_by_run(&mut *tx, run_id).await?.is_some();
    let has_handoff = HandoffRepo::find_by_run(&mut *tx, run_id).await?.is_some();
    tx.commit().await?;

    Ok(ReadinessReport {
        run_id,
        status: run.status,
        evaluated_at: now,
        summary,
        is_locked,
        has_handoff,
    })
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Freeze the run and its attachments. At most one snapshot per run.
pub async fn lock(state: &AppState, run_id: DbId, note: Option<String>) -> AppResult<ReadinessSnapshot> {
    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;
    ensure_planning_state(run_status(&run)?, "lock readiness")?;

    if SnapshotRepo::find_by_run(&mut *tx, run_id).await?.is_some() {
        return Err(CoreError::conflict(ALREADY_LOCKED, "Run readiness is already locked").into());
    }

    let now = Utc::now();
    let (attached, summary) = current_summary(&mut tx, state, &run, now).await?;
    let payload = build_payload(&run, &attached, summary);
    let json = payload
        .to_json()
        .map_err(|e| AppError::InternalError(format!("Failed to encode snapshot: {e}")))?;

    let snapshot = SnapshotRepo::create(&mut *tx, run_id, note.as_deref(), &json).await?;
    tx.commit().await?;

    tracing::info!(run_id, snapshot_id = snapshot.id, attached = attached.len(), "Readiness locked");
    publish_all(
        state,
        vec![CoordinationEvent::for_run(READINESS_LOCKED, run_id).with_payload(serde_json::json!({
            "snapshot_id": snapshot.id,
            "locked_at": snapshot.locked_at,
        }))],
    );
    Ok(snapshot)
}

/// Delete the snapshot so the run can be re-locked.
pub async fn unlock(state: &AppState, run_id: DbId) -> AppResult<()> {
    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;
    ensure_planning_state(run_status(&run)?, "unlock readiness")?;

    if !SnapshotRepo::delete_by_run(&mut *tx, run_id).await? {
        return Err(not_found("ReadinessSnapshot", run_id));
    }
    tx.commit().await?;

    tracing::info!(run_id, "Readiness unlocked");
    publish_all(state, vec![CoordinationEvent::for_run(READINESS_UNLOCKED, run_id)]);
    Ok(())
}

pub async fn get_snapshot(state: &AppState, run_id: DbId) -> AppResult<ReadinessSnapshot> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let snapshot = SnapshotRepo::find_by_run(&mut *tx, run_id)
        .await?
        .ok_or_else(|| not_found("ReadinessSnapshot", run_id))?;
    tx.commit().await?;
    Ok(snapshot)
}

fn build_payload(
    run: &ServiceRun,
    attached: &[AttachedRequest],
    summary: ReadinessSummary,
) -> SnapshotPayload {
    SnapshotPayload {
        run: SnapshotRunState {
            id: run.id,
            name: run.name.clone(),
            status: run.status.clone(),
            portal_id: run.portal_id,
            zone_id: run.zone_id,
            starts_at: run.starts_at,
            ends_at: run.ends_at,
            expected_request_count: run.expected_request_count,
        },
        requests: attached
            .iter()
            .map(|a| SnapshotRequest {
                request_id: a.request_id,
                attached_at: a.attached_at,
                coordination_opt_in: a.current_opt_in,
                status: a.current_status.clone(),
                zone_id: a.current_zone_id,
                category: a.current_category.clone(),
            })
            .collect(),
        summary,
    }
}

// ---------------------------------------------------------------------------
// Eligibility and handoff
// ---------------------------------------------------------------------------

async fn eligibility_in(
    conn: &mut PgConnection,
    state: &AppState,
    run: &ServiceRun,
) -> AppResult<ExecutionEligibility> {
    let snapshot = SnapshotRepo::find_by_run(&mut *conn, run.id)
        .await?
        .ok_or_else(|| {
            CoreError::precondition(NO_SNAPSHOT, "Run readiness has not been locked")
        })?;
    let payload = SnapshotPayload::from_json(&snapshot.payload).map_err(|e| {
        AppError::InternalError(format!("Snapshot {} is unreadable: {e}", snapshot.id))
    })?;

    let now = Utc::now();
    let (_, now_summary) = current_summary(conn, state, run, now).await?;
    Ok(eligibility::evaluate(
        run.id,
        snapshot.locked_at,
        &payload.summary,
        &now_summary,
        now,
    ))
}

/// Diff current readiness against the locked snapshot. Read-only.
pub async fn evaluate_eligibility(state: &AppState, run_id: DbId) -> AppResult<ExecutionEligibility> {
    let mut tx = begin_read(&state.pool).await?;
    let run = load_run(&mut tx, run_id).await?;
    let result = eligibility_in(&mut tx, state, &run).await?;
    tx.commit().await?;
    tracing::debug!(run_id, overall = result.overall.as_str(), "Eligibility evaluated");
    Ok(result)
}

/// Record the one-time handoff to execution, embedding the eligibility
/// evaluated at this moment.
pub async fn create_handoff(
    state: &AppState,
    run_id: DbId,
    note: Option<String>,
) -> AppResult<ExecutionHandoff> {
    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;

    if HandoffRepo::find_by_run(&mut *tx, run_id).await?.is_some() {
        return Err(CoreError::conflict(
            ALREADY_EXISTS,
            "An execution handoff already exists for this run",
        )
        .into());
    }
    let eligibility = eligibility_in(&mut tx, state, &run).await?;
    ensure_planning_state(run_status(&run)?, "hand off to execution")?;

    let json = serde_json::to_value(&eligibility)
        .map_err(|e| AppError::InternalError(format!("Failed to encode eligibility: {e}")))?;
    let handoff = HandoffRepo::create(&mut *tx, run_id, note.as_deref(), &json).await?;
    tx.commit().await?;

    tracing::info!(
        run_id,
        handoff_id = handoff.id,
        overall = eligibility.overall.as_str(),
        "Execution handoff created"
    );
    publish_all(
        state,
        vec![CoordinationEvent::for_run(HANDOFF_CREATED, run_id).with_payload(serde_json::json!({
            "handoff_id": handoff.id,
            "overall": eligibility.overall,
        }))],
    );
    Ok(handoff)
}

pub async fn get_handoff(state: &AppState, run_id: DbId) -> AppResult<ExecutionHandoff> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let handoff = HandoffRepo::find_by_run(&mut *tx, run_id)
        .await?
        .ok_or_else(|| not_found("ExecutionHandoff", run_id))?;
    tx.commit().await?;
    Ok(handoff)
}
