//! Repository for the `coordination_events` table.

use sqlx::PgExecutor;

use n3_core::types::DbId;

use crate::models::event::StoredEvent;

const COLUMNS: &str = "id, event_type, run_id, payload, created_at";

pub struct EventRepo;

impl EventRepo {
    /// Insert an event row, returning the new id.
    pub async fn insert<'e>(
        db: impl PgExecutor<'e>,
        event_type: &str,
        run_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO coordination_events (event_type, run_id, payload) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(run_id)
        .bind(payload)
        .fetch_one(db)
        .await?;
        Ok(row.0)
    }

    /// Events for a run, newest first.
    pub async fn list_for_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM coordination_events \
             WHERE run_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, StoredEvent>(&query)
            .bind(run_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }
}
