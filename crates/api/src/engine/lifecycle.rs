//! Service run lifecycle: create, edit, locate, promote, demote.

use serde::Serialize;
use validator::Validate;

use n3_core::lifecycle::{
    self, ensure_planning_state, plan_transition, promotion_warnings, LifecycleWarning,
    RunStatus, TransitionPlan,
};
use n3_core::pagination::{clamp_limit, clamp_offset};
use n3_core::types::DbId;
use n3_db::models::service_run::{
    CreateServiceRun, ServiceRun, ServiceRunListParams, SetLocation, StatusHistoryEntry,
    UpdateServiceRun,
};
use n3_db::repositories::{AttachmentRepo, ServiceRunRepo};
use n3_events::bus::{
    SERVICE_RUN_CREATED, SERVICE_RUN_DEMOTED, SERVICE_RUN_PROMOTED, SERVICE_RUN_UPDATED,
};
use n3_events::CoordinationEvent;

use crate::error::AppResult;
use crate::state::AppState;

use super::{begin_for_run, load_run, not_found, payload, publish_all, run_status};

/// Result of a promote or demote call.
#[derive(Debug, Serialize)]
pub struct TransitionOutcome {
    pub run: ServiceRun,
    /// False when the run was already in the target status.
    pub changed: bool,
    pub warnings: Vec<LifecycleWarning>,
}

pub async fn create_run(state: &AppState, input: CreateServiceRun) -> AppResult<ServiceRun> {
    input.validate()?;
    lifecycle::validate_run_name(&input.name)?;
    lifecycle::validate_location(input.portal_id, input.zone_id)?;
    lifecycle::validate_window(input.starts_at, input.ends_at)?;

    let run = ServiceRunRepo::create(&state.pool, &input).await?;

    publish_all(
        state,
        vec![CoordinationEvent::for_run(SERVICE_RUN_CREATED, run.id).with_payload(payload(&run))],
    );
    Ok(run)
}

pub async fn get_run(state: &AppState, run_id: DbId) -> AppResult<ServiceRun> {
    ServiceRunRepo::find_by_id(&state.pool, run_id)
        .await?
        .ok_or_else(|| not_found("ServiceRun", run_id))
}

pub async fn list_runs(state: &AppState, params: &ServiceRunListParams) -> AppResult<Vec<ServiceRun>> {
    if let Some(status) = params.status.as_deref() {
        RunStatus::from_str_value(status)?;
    }
    let limit = clamp_limit(params.limit, 25, 100);
    let offset = clamp_offset(params.offset);
    let runs = ServiceRunRepo::list(
        &state.pool,
        params.status.as_deref(),
        params.portal_id,
        limit,
        offset,
    )
    .await?;
    Ok(runs)
}

/// Edit descriptive fields and the scheduling window.
///
/// The merged window must still be ordered. Only planning-state runs are
/// editable.
pub async fn update_run(
    state: &AppState,
    run_id: DbId,
    input: UpdateServiceRun,
) -> AppResult<ServiceRun> {
    input.validate()?;
    if let Some(name) = input.name.as_deref() {
        lifecycle::validate_run_name(name)?;
    }

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;
    ensure_planning_state(run_status(&run)?, "edit a run")?;
    lifecycle::validate_window(
        input.starts_at.or(run.starts_at),
        input.ends_at.or(run.ends_at),
    )?;

    let updated = ServiceRunRepo::update(&mut *tx, run_id, &input)
        .await?
        .ok_or_else(|| not_found("ServiceRun", run_id))?;
    tx.commit().await?;

    publish_all(
        state,
        vec![CoordinationEvent::for_run(SERVICE_RUN_UPDATED, run_id).with_payload(payload(&updated))],
    );
    Ok(updated)
}

/// Set or clear the portal and zone. Clearing the portal clears the zone.
pub async fn set_location(state: &AppState, run_id: DbId, input: SetLocation) -> AppResult<ServiceRun> {
    let zone_id = if input.portal_id.is_none() {
        None
    } else {
        input.zone_id
    };
    lifecycle::validate_location(input.portal_id, zone_id)?;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;
    ensure_planning_state(run_status(&run)?, "change the run location")?;

    let updated = ServiceRunRepo::set_location(&mut *tx, run_id, input.portal_id, zone_id)
        .await?
        .ok_or_else(|| not_found("ServiceRun", run_id))?;
    tx.commit().await?;

    tracing::info!(run_id, portal_id = ?updated.portal_id, zone_id = ?updated.zone_id, "Run location set");
    publish_all(
        state,
        vec![CoordinationEvent::for_run(SERVICE_RUN_UPDATED, run_id).with_payload(payload(&updated))],
    );
    Ok(updated)
}

/// Move a run between `draft` and `scheduled`.
///
/// Calling with the current status is a no-op that writes no history.
/// Promotion reports non-blocking warnings about missing setup.
pub async fn transition(
    state: &AppState,
    run_id: DbId,
    target: RunStatus,
    note: Option<String>,
) -> AppResult<TransitionOutcome> {
    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;
    let current = run_status(&run)?;

    let plan = plan_transition(current, target)?;
    let (run, changed) = match plan {
        TransitionPlan::NoOp => (run, false),
        TransitionPlan::Apply { from, to } => {
            let updated = ServiceRunRepo::set_status(&mut *tx, run_id, to.as_str())
                .await?
                .ok_or_else(|| not_found("ServiceRun", run_id))?;
            ServiceRunRepo::record_status_change(
                &mut *tx,
                run_id,
                Some(from.as_str()),
                to.as_str(),
                note.as_deref(),
            )
            .await?;
            (updated, true)
        }
    };

    let warnings = if target == RunStatus::Scheduled {
        let attached = AttachmentRepo::count_for_run(&mut *tx, run_id).await?;
        promotion_warnings(run.zone_id, attached, run.starts_at, run.ends_at)
    } else {
        Vec::new()
    };
    tx.commit().await?;

    if changed {
        tracing::info!(run_id, from = %current.as_str(), to = %target.as_str(), "Run status changed");
        let event_type = match target {
            RunStatus::Scheduled => SERVICE_RUN_PROMOTED,
            _ => SERVICE_RUN_DEMOTED,
        };
        publish_all(
            state,
            vec![CoordinationEvent::for_run(event_type, run_id).with_payload(serde_json::json!({
                "from": current.as_str(),
                "to": target.as_str(),
                "note": note,
            }))],
        );
    }

    Ok(TransitionOutcome {
        run,
        changed,
        warnings,
    })
}

pub async fn status_history(state: &AppState, run_id: DbId) -> AppResult<Vec<StatusHistoryEntry>> {
    get_run(state, run_id).await?;
    Ok(ServiceRunRepo::list_status_history(&state.pool, run_id).await?)
}

