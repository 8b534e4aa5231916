//! Stakeholder responses and provider resolutions.

use validator::Validate;

use n3_core::pagination::{clamp_limit, clamp_offset};
use n3_core::schedule_proposal::{merge_context, ActorRole, NewEvent, ROLE_PROVIDER};
use n3_core::stakeholder::{
    proposal_event_for, resolution_context, validate_message, validate_response_type,
    ResolutionType,
};
use n3_core::types::DbId;
use n3_db::models::schedule_proposal::ScheduleProposalEvent;
use n3_db::models::stakeholder::{
    CreateResolution, CreateStakeholderResponse, ProposalAttempt, ProposalAttemptError,
    Resolution, ResolutionProposal, ResolveResult, ResponseWithResolution, StakeholderResponse,
};
use n3_db::repositories::StakeholderRepo;
use n3_events::bus::{STAKEHOLDER_RESPONSE_RECORDED, STAKEHOLDER_RESPONSE_RESOLVED};
use n3_events::CoordinationEvent;

use crate::error::AppResult;
use crate::state::AppState;

use super::negotiation::{append_event, load_thread, publish_proposal};
use super::{begin_for_run, begin_read, load_run, not_found, payload, publish_all};

pub async fn record_response(
    state: &AppState,
    run_id: DbId,
    input: CreateStakeholderResponse,
) -> AppResult<StakeholderResponse> {
    input.validate()?;
    validate_response_type(&input.response_type)?;
    validate_message(Some(&input.message), true)?;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    load_run(&mut tx, run_id).await?;
    let response = StakeholderRepo::create_response(&mut *tx, run_id, &input).await?;
    tx.commit().await?;

    tracing::info!(run_id, response_id = response.id, response_type = %response.response_type, "Stakeholder response recorded");
    publish_all(
        state,
        vec![CoordinationEvent::for_run(STAKEHOLDER_RESPONSE_RECORDED, run_id)
            .with_payload(payload(&response))],
    );
    Ok(response)
}

/// Responses for a run, each with its current resolution.
pub async fn list_responses(
    state: &AppState,
    run_id: DbId,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<ResponseWithResolution>> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let responses = StakeholderRepo::list_responses(
        &mut *tx,
        run_id,
        clamp_limit(limit, 25, 100),
        clamp_offset(offset),
    )
    .await?;
    let ids: Vec<DbId> = responses
        .iter()
        .filter_map(|r| r.current_resolution_id)
        .collect();
    let resolutions = if ids.is_empty() {
        Vec::new()
    } else {
        StakeholderRepo::find_resolutions_by_ids(&mut *tx, &ids).await?
    };
    tx.commit().await?;

    Ok(responses
        .into_iter()
        .map(|response| {
            let current_resolution = response
                .current_resolution_id
                .and_then(|id| resolutions.iter().find(|r| r.id == id).cloned());
            ResponseWithResolution {
                response,
                current_resolution,
            }
        })
        .collect())
}

pub async fn list_resolutions(state: &AppState, response_id: DbId) -> AppResult<Vec<Resolution>> {
    let mut tx = begin_read(&state.pool).await?;
    StakeholderRepo::find_response(&mut *tx, response_id)
        .await?
        .ok_or_else(|| not_found("StakeholderResponse", response_id))?;
    let resolutions = StakeholderRepo::list_resolutions(&mut *tx, response_id).await?;
    tx.commit().await?;
    Ok(resolutions)
}

/// Append a resolution and make it the response's current one.
///
/// A `proposed_change` resolution then tries to put a proposal on the
/// run's negotiation thread in a separate transaction. The resolution
/// stands whether or not that attempt succeeds; the outcome is reported
/// in `proposal_attempt`.
pub async fn resolve(
    state: &AppState,
    response_id: DbId,
    input: CreateResolution,
) -> AppResult<ResolveResult> {
    input.validate()?;
    let resolution_type = ResolutionType::from_str_value(&input.resolution_type)?;
    validate_message(input.message.as_deref(), false)?;

    let run_id = StakeholderRepo::find_response(&state.pool, response_id)
        .await?
        .ok_or_else(|| not_found("StakeholderResponse", response_id))?
        .run_id;

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let resolution = StakeholderRepo::create_resolution(
        &mut *tx,
        response_id,
        resolution_type.as_str(),
        input.message.as_deref(),
    )
    .await?;
    StakeholderRepo::set_current_resolution(&mut *tx, response_id, resolution.id)
        .await?
        .ok_or_else(|| not_found("StakeholderResponse", response_id))?;
    tx.commit().await?;

    tracing::info!(
        run_id,
        response_id,
        resolution_id = resolution.id,
        resolution_type = resolution_type.as_str(),
        "Stakeholder response resolved"
    );
    publish_all(
        state,
        vec![CoordinationEvent::for_run(STAKEHOLDER_RESPONSE_RESOLVED, run_id)
            .with_payload(payload(&resolution))],
    );

    let proposal_attempt = if resolution_type.opens_proposal() {
        let proposal = input.proposal.unwrap_or_default();
        let outcome =
            propose_from_resolution(state, run_id, response_id, resolution.id, proposal).await;
        let attempt = match outcome {
            Ok(event) => {
                publish_proposal(state, &event);
                ProposalAttempt::Created { event }
            }
            Err(err) => {
                let (_, code, message) = err.describe();
                tracing::info!(
                    run_id,
                    resolution_id = resolution.id,
                    code,
                    "Proposal from resolution failed"
                );
                ProposalAttempt::Failed {
                    error: ProposalAttemptError {
                        code: code.to_string(),
                        kind: err.kind().as_str().to_string(),
                        message,
                    },
                }
            }
        };
        Some(attempt)
    } else {
        None
    };

    Ok(ResolveResult {
        resolution,
        proposal_attempt,
    })
}

/// Provider-side proposal carrying the response and resolution ids.
///
/// Without an explicit window the latest thread window is reused, then the
/// run's own window.
async fn propose_from_resolution(
    state: &AppState,
    run_id: DbId,
    response_id: DbId,
    resolution_id: DbId,
    proposal: ResolutionProposal,
) -> AppResult<ScheduleProposalEvent> {
    let mut tx = begin_for_run(&state.pool, run_id).await?;
    let run = load_run(&mut tx, run_id).await?;
    let (_, thread) = load_thread(&mut tx, run_id).await?;

    let (proposed_start, proposed_end) = match (proposal.proposed_start, proposal.proposed_end) {
        (None, None) => (
            thread.latest_start.or(run.starts_at),
            thread.latest_end.or(run.ends_at),
        ),
        window => window,
    };
    let event = NewEvent {
        actor_role: ActorRole::Provider,
        event_type: proposal_event_for(&thread),
        proposed_start,
        proposed_end,
        proposal_context: Some(merge_context(
            proposal.proposal_context,
            resolution_context(response_id, resolution_id),
        )),
    };
    let actor_id = proposal
        .actor_id
        .unwrap_or_else(|| ROLE_PROVIDER.to_string());

    let created = append_event(
        &mut tx,
        &state.policy,
        run_id,
        &thread,
        event,
        actor_id,
        proposal.note,
    )
    .await?;
    tx.commit().await?;
    Ok(created)
}
