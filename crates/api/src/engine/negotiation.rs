//! Schedule proposal negotiation threads.

use sqlx::PgConnection;
use validator::Validate;

use n3_core::policy::CoordinationPolicy;
use n3_core::schedule_proposal::{
    derive_state, validate_new_event, ActorRole, NewEvent, ProposalEventType, ThreadState,
};
use n3_core::types::DbId;
use n3_db::models::schedule_proposal::{
    CreateProposalEvent, NewProposalEventRow, ProposalThread, ScheduleProposalEvent,
};
use n3_db::repositories::ScheduleProposalRepo;
use n3_events::bus::SCHEDULE_PROPOSAL_CREATED;
use n3_events::CoordinationEvent;

use crate::error::AppResult;
use crate::state::AppState;

use super::{begin_for_run, begin_read, load_run, payload, publish_all};

/// Stored events (oldest first) and the state derived from them.
pub async fn load_thread(
    conn: &mut PgConnection,
    run_id: DbId,
) -> AppResult<(Vec<ScheduleProposalEvent>, ThreadState)> {
    let events = ScheduleProposalRepo::list_for_run(conn, run_id).await?;
    let thread: Vec<_> = events
        .iter()
        .filter_map(ScheduleProposalEvent::thread_event)
        .collect();
    let state = derive_state(&thread);
    Ok((events, state))
}

/// Validate `event` against `thread` and insert it.
///
/// Caller must hold the run lock.
pub async fn append_event(
    conn: &mut PgConnection,
    policy: &CoordinationPolicy,
    run_id: DbId,
    thread: &ThreadState,
    event: NewEvent,
    actor_id: String,
    note: Option<String>,
) -> AppResult<ScheduleProposalEvent> {
    let (proposed_start, proposed_end) = validate_new_event(thread, &event, policy)?;
    let row = NewProposalEventRow {
        actor_role: event.actor_role.as_str().to_string(),
        actor_id,
        event_type: event.event_type.as_str().to_string(),
        proposed_start,
        proposed_end,
        note,
        proposal_context: event.proposal_context,
    };
    Ok(ScheduleProposalRepo::insert(conn, run_id, &row).await?)
}

pub async fn create_proposal(
    state: &AppState,
    run_id: DbId,
    input: CreateProposalEvent,
) -> AppResult<ScheduleProposalEvent> {
    input.validate()?;
    let event = NewEvent {
        actor_role: ActorRole::from_str_value(&input.actor_role)?,
        event_type: ProposalEventType::from_str_value(&input.event_type)?,
        proposed_start: input.proposed_start,
        proposed_end: input.proposed_end,
        proposal_context: input.proposal_context,
    };

    let mut tx = begin_for_run(&state.pool, run_id).await?;
    load_run(&mut tx, run_id).await?;
    let (_, thread) = load_thread(&mut tx, run_id).await?;
    let created = append_event(
        &mut tx,
        &state.policy,
        run_id,
        &thread,
        event,
        input.actor_id,
        input.note,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        run_id,
        event_id = created.id,
        event_type = %created.event_type,
        actor_role = %created.actor_role,
        "Schedule proposal event recorded"
    );
    publish_proposal(state, &created);
    Ok(created)
}

pub fn publish_proposal(state: &AppState, event: &ScheduleProposalEvent) {
    publish_all(
        state,
        vec![CoordinationEvent::for_run(SCHEDULE_PROPOSAL_CREATED, event.run_id)
            .with_payload(payload(event))],
    );
}

pub async fn get_thread(state: &AppState, run_id: DbId) -> AppResult<ProposalThread> {
    let mut tx = begin_read(&state.pool).await?;
    load_run(&mut tx, run_id).await?;
    let (events, thread) = load_thread(&mut tx, run_id).await?;
    tx.commit().await?;

    Ok(ProposalThread {
        run_id,
        events,
        turns_used: thread.turns_used,
        turn_cap: state.policy.proposal_turn_cap,
        is_closed: thread.is_closed,
        outcome: thread.outcome.map(|o| o.as_str().to_string()),
        latest_start: thread.latest_start,
        latest_end: thread.latest_end,
    })
}
