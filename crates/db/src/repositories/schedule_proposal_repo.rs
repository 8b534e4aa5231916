//! Repository for the `schedule_proposal_events` table. Append-only.

use sqlx::PgExecutor;

use n3_core::types::DbId;

use crate::models::schedule_proposal::{NewProposalEventRow, ScheduleProposalEvent};

const COLUMNS: &str = "id, run_id, actor_role, actor_id, event_type, proposed_start, \
     proposed_end, note, proposal_context, created_at";

pub struct ScheduleProposalRepo;

impl ScheduleProposalRepo {
    /// All events of the run's thread, oldest first.
    pub async fn list_for_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Vec<ScheduleProposalEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM schedule_proposal_events WHERE run_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, ScheduleProposalEvent>(&query)
            .bind(run_id)
            .fetch_all(db)
            .await
    }

    pub async fn insert<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        row: &NewProposalEventRow,
    ) -> Result<ScheduleProposalEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO schedule_proposal_events \
                (run_id, actor_role, actor_id, event_type, proposed_start, proposed_end, \
                 note, proposal_context) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScheduleProposalEvent>(&query)
            .bind(run_id)
            .bind(&row.actor_role)
            .bind(&row.actor_id)
            .bind(&row.event_type)
            .bind(row.proposed_start)
            .bind(row.proposed_end)
            .bind(&row.note)
            .bind(&row.proposal_context)
            .fetch_one(db)
            .await
    }
}
