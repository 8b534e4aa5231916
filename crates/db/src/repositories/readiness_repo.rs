//! Repository for the `readiness_snapshots` and `execution_handoffs` tables.
//!
//! Snapshots are insert-or-delete only; handoffs are insert-only.

use sqlx::PgExecutor;

use n3_core::types::DbId;

use crate::models::readiness::{ExecutionHandoff, ReadinessSnapshot};

const SNAPSHOT_COLUMNS: &str = "id, run_id, locked_at, note, payload";

const HANDOFF_COLUMNS: &str = "id, run_id, note, eligibility, created_at";

pub struct SnapshotRepo;

impl SnapshotRepo {
    pub async fn find_by_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Option<ReadinessSnapshot>, sqlx::Error> {
        let query = format!("SELECT {SNAPSHOT_COLUMNS} FROM readiness_snapshots WHERE run_id = $1");
        sqlx::query_as::<_, ReadinessSnapshot>(&query)
            .bind(run_id)
            .fetch_optional(db)
            .await
    }

    /// Insert the snapshot. A second insert for the same run fails on
    /// `uq_readiness_snapshots_run_id`.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        note: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<ReadinessSnapshot, sqlx::Error> {
        let query = format!(
            "INSERT INTO readiness_snapshots (run_id, note, payload) \
             VALUES ($1, $2, $3) \
             RETURNING {SNAPSHOT_COLUMNS}"
        );
        sqlx::query_as::<_, ReadinessSnapshot>(&query)
            .bind(run_id)
            .bind(note)
            .bind(payload)
            .fetch_one(db)
            .await
    }

    /// Hard-delete the run's snapshot. Returns true if one existed.
    pub async fn delete_by_run<'e>(db: impl PgExecutor<'e>, run_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM readiness_snapshots WHERE run_id = $1")
            .bind(run_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct HandoffRepo;

impl HandoffRepo {
    pub async fn find_by_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Option<ExecutionHandoff>, sqlx::Error> {
        let query = format!("SELECT {HANDOFF_COLUMNS} FROM execution_handoffs WHERE run_id = $1");
        sqlx::query_as::<_, ExecutionHandoff>(&query)
            .bind(run_id)
            .fetch_optional(db)
            .await
    }

    /// Insert the handoff. A second insert for the same run fails on
    /// `uq_execution_handoffs_run_id`.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        note: Option<&str>,
        eligibility: &serde_json::Value,
    ) -> Result<ExecutionHandoff, sqlx::Error> {
        let query = format!(
            "INSERT INTO execution_handoffs (run_id, note, eligibility) \
             VALUES ($1, $2, $3) \
             RETURNING {HANDOFF_COLUMNS}"
        );
        sqlx::query_as::<_, ExecutionHandoff>(&query)
            .bind(run_id)
            .bind(note)
            .bind(eligibility)
            .fetch_one(db)
            .await
    }
}
