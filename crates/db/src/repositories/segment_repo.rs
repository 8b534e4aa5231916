//! Repository for the `run_segments` and `segment_signals` tables.

use sqlx::PgExecutor;

use n3_core::risk::SEGMENT_STATUS_ACTIVE;
use n3_core::types::DbId;

use crate::models::risk::{CreateRunSegment, CreateSegmentSignal, RunSegment, SegmentSignal};

const COLUMNS: &str =
    "id, run_id, sequence, label, starts_at, ends_at, status, created_at, updated_at";

const SIGNAL_COLUMNS: &str =
    "id, segment_id, signal_type, severity, detail, observed_at, cleared_at";

pub struct SegmentRepo;

impl SegmentRepo {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        input: &CreateRunSegment,
    ) -> Result<RunSegment, sqlx::Error> {
        let query = format!(
            "INSERT INTO run_segments (run_id, sequence, label, starts_at, ends_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunSegment>(&query)
            .bind(run_id)
            .bind(input.sequence)
            .bind(&input.label)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<RunSegment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM run_segments WHERE id = $1");
        sqlx::query_as::<_, RunSegment>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Segments of a run in sequence order.
    pub async fn list_for_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Vec<RunSegment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM run_segments WHERE run_id = $1 ORDER BY sequence"
        );
        sqlx::query_as::<_, RunSegment>(&query)
            .bind(run_id)
            .fetch_all(db)
            .await
    }

    /// Set a segment's status, scoped to its run.
    pub async fn set_status<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        id: DbId,
        status: &str,
    ) -> Result<Option<RunSegment>, sqlx::Error> {
        let query = format!(
            "UPDATE run_segments SET status = $3 \
             WHERE id = $1 AND run_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunSegment>(&query)
            .bind(id)
            .bind(run_id)
            .bind(status)
            .fetch_optional(db)
            .await
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    pub async fn create_signal<'e>(
        db: impl PgExecutor<'e>,
        segment_id: DbId,
        input: &CreateSegmentSignal,
    ) -> Result<SegmentSignal, sqlx::Error> {
        let query = format!(
            "INSERT INTO segment_signals (segment_id, signal_type, severity, detail, observed_at) \
             VALUES ($1, $2, $3, $4, COALESCE($5, NOW())) \
             RETURNING {SIGNAL_COLUMNS}"
        );
        sqlx::query_as::<_, SegmentSignal>(&query)
            .bind(segment_id)
            .bind(&input.signal_type)
            .bind(input.severity)
            .bind(&input.detail)
            .bind(input.observed_at)
            .fetch_one(db)
            .await
    }

    pub async fn find_signal<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<SegmentSignal>, sqlx::Error> {
        let query = format!("SELECT {SIGNAL_COLUMNS} FROM segment_signals WHERE id = $1");
        sqlx::query_as::<_, SegmentSignal>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Mark a signal cleared. Clearing twice keeps the first timestamp.
    pub async fn clear_signal<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<SegmentSignal>, sqlx::Error> {
        let query = format!(
            "UPDATE segment_signals SET cleared_at = COALESCE(cleared_at, NOW()) \
             WHERE id = $1 \
             RETURNING {SIGNAL_COLUMNS}"
        );
        sqlx::query_as::<_, SegmentSignal>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Uncleared signals on the run's active segments.
    pub async fn list_open_signals_for_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Vec<SegmentSignal>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM segment_signals s \
             JOIN run_segments g ON g.id = s.segment_id \
             WHERE g.run_id = $1 AND g.status = $2 AND s.cleared_at IS NULL \
             ORDER BY g.sequence, s.id",
            prefixed_signal_columns()
        );
        sqlx::query_as::<_, SegmentSignal>(&query)
            .bind(run_id)
            .bind(SEGMENT_STATUS_ACTIVE)
            .fetch_all(db)
            .await
    }
}

fn prefixed_signal_columns() -> String {
    SIGNAL_COLUMNS
        .split(", ")
        .map(|c| format!("s.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
