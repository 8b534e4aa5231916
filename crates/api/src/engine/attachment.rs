//! Attaching and detaching maintenance requests.

use n3_core::drift::{check_attach_eligibility, normalize_batch};
use n3_core::lifecycle::ensure_planning_state;
use n3_core::pagination::{clamp_limit, clamp_offset};
use n3_core::types::DbId;
use n3_db::models::maintenance_request::{
    AttachResult, AttachedRequest, DetachResult, EligibleRequestParams, MaintenanceRequest,
};
use n3_db::repositories::{AttachmentRepo, MaintenanceRequestRepo};
use n3_events::bus::{ATTACHMENTS_ADDED, ATTACHMENTS_REMOVED};
use n3_events::CoordinationEvent;

use crate::error::AppResult;
use crate::state::AppState;

use super::{begin_for_run, begin_read, load_run, not_found, publish_all, run_status};

/// Requests that could be attached to the run right now.
///
/// A run without a portal has no candidates. A zoneless run only lists
/// unzoned requests, and only when `include_unzoned` is set.
pub async fn list_eligible(
    state: &AppState,
    run_id: DbId,
    params: &EligibleRequestParams,
) -> AppResult<Vec<MaintenanceRequest>> {
    let mut tx = begin_read(&state.pool).await?;
    let run = load_run(&mut tx, run_id).await?;

    let Some(portal_id) = run.portal_id else {
        return Ok(Vec::new());
    };
    if run.zone_id.is_none() && !params.include_unzoned {
        return Ok(Vec::new());
    }

    let limit = clamp_limit(params.limit, 50, 200);
    let offset = clamp_offset(params.offset);
    let requests = MaintenanceRequestRepo::list_eligible(
        &mut *tx,
        run_id,
        portal_id,
        run.zone_id,
        params,
        limit,
        offset,
    )
    .await?;
    tx.commit().await?;
    Ok(requests)
}

/// Attach a batch of requests, all or nothing.
///
/// Ids already attached are reported back and left untouched; every other
/// id must exist and be eligible or the whole call fails with
/// `NOT_ELIGIBLE`.
pub async fn attach(state: &AppState, run_id: DbId, request_ids: &[DbId]) -> AppResult<AttachResult> {
    let ids = normalize_batch(request_ids, state.policy.attach_batch_limit)?;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;
    ensure_planning_state(run_status(&run)?, "attach requests")?;

    let already_attached = AttachmentRepo::attached_among(&mut *tx, run_id, &ids).await?;
    let to_attach: Vec<DbId> = ids
        .iter()
        .copied()
        .filter(|id| !already_attached.contains(id))
        .collect();

    let mut attached = Vec::new();
    if !to_attach.is_empty() {
        let found = MaintenanceRequestRepo::find_by_ids(&mut *tx, &to_attach).await?;
        let candidates: Vec<_> = found
            .iter()
            .map(|r| (r.id, r.portal_id, r.state()))
            .collect();
        check_attach_eligibility(run.portal_id, run.zone_id, &to_attach, &candidates)?;
        attached = AttachmentRepo::attach(&mut *tx, run_id, &to_attach).await?;
    }
    tx.commit().await?;

    tracing::info!(
        run_id,
        attached = attached.len(),
        already_attached = already_attached.len(),
        "Requests attached"
    );
    if !attached.is_empty() {
        publish_all(
            state,
            vec![CoordinationEvent::for_run(ATTACHMENTS_ADDED, run_id)
                .with_payload(serde_json::json!({ "request_ids": attached }))],
        );
    }

    Ok(AttachResult {
        run_id,
        attached,
        already_attached,
    })
}

/// Detach a batch of requests, all or nothing.
///
/// Any id that is not attached to the run fails the call with
/// `NOT_FOUND`. Detaching is allowed in every run status.
pub async fn detach(state: &AppState, run_id: DbId, request_ids: &[DbId]) -> AppResult<DetachResult> {
    let ids = normalize_batch(request_ids, usize::MAX)?;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    load_run(&mut tx, run_id).await?;

    let present = AttachmentRepo::attached_among(&mut *tx, run_id, &ids).await?;
    if let Some(missing) = ids.iter().find(|id| !present.contains(id)) {
        return Err(not_found("Attachment", *missing));
    }
    let detached = AttachmentRepo::detach(&mut *tx, run_id, &ids).await?;
    tx.commit().await?;

    tracing::info!(run_id, detached = detached.len(), "Requests detached");
    publish_all(
        state,
        vec![CoordinationEvent::for_run(ATTACHMENTS_REMOVED, run_id)
            .with_payload(serde_json::json!({ "request_ids": detached }))],
    );

    Ok(DetachResult { run_id, detached })
}

pub async fn list_attached(state: &AppState, run_id: DbId) -> AppResult<Vec<AttachedRequest>> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let attached = AttachmentRepo::list_for_run(&mut *tx, run_id).await?;
    tx.commit().await?;
    Ok(attached)
}
