//! Repository for the `service_run_attached_requests` table.

use sqlx::PgExecutor;

use n3_core::types::DbId;

use crate::models::maintenance_request::AttachedRequest;

const JOINED_COLUMNS: &str = "a.run_id, a.request_id, a.attached_at, \
     a.captured_opt_in, a.captured_opt_in_at, a.captured_status, \
     a.captured_zone_id, a.captured_category, \
     r.title, r.portal_id, \
     r.coordination_opt_in AS current_opt_in, \
     r.coordination_opt_in_at AS current_opt_in_at, \
     r.status AS current_status, \
     r.zone_id AS current_zone_id, \
     r.category AS current_category";

pub struct AttachmentRepo;

impl AttachmentRepo {
    /// Attach requests, copying their current state into the captured
    /// columns in the same statement. Already-attached ids are skipped.
    ///
    /// Returns the ids that were newly attached.
    pub async fn attach<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        request_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "INSERT INTO service_run_attached_requests \
                (run_id, request_id, captured_opt_in, captured_opt_in_at, \
                 captured_status, captured_zone_id, captured_category) \
             SELECT $1, id, coordination_opt_in, coordination_opt_in_at, \
                    status, zone_id, category \
             FROM maintenance_requests WHERE id = ANY($2) \
             ON CONFLICT (run_id, request_id) DO NOTHING \
             RETURNING request_id",
        )
        .bind(run_id)
        .bind(request_ids)
        .fetch_all(db)
        .await?;
        let mut ids: Vec<DbId> = rows.into_iter().map(|r| r.0).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Which of `request_ids` are attached to the run.
    pub async fn attached_among<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        request_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT request_id FROM service_run_attached_requests \
             WHERE run_id = $1 AND request_id = ANY($2) \
             ORDER BY request_id",
        )
        .bind(run_id)
        .bind(request_ids)
        .fetch_all(db)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Remove attachments. Returns the ids removed.
    pub async fn detach<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        request_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "DELETE FROM service_run_attached_requests \
             WHERE run_id = $1 AND request_id = ANY($2) \
             RETURNING request_id",
        )
        .bind(run_id)
        .bind(request_ids)
        .fetch_all(db)
        .await?;
        let mut ids: Vec<DbId> = rows.into_iter().map(|r| r.0).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Attachments with current request state, in attach order.
    pub async fn list_for_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Vec<AttachedRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} \
             FROM service_run_attached_requests a \
             JOIN maintenance_requests r ON r.id = a.request_id \
             WHERE a.run_id = $1 \
             ORDER BY a.attached_at, a.request_id"
        );
        sqlx::query_as::<_, AttachedRequest>(&query)
            .bind(run_id)
            .fetch_all(db)
            .await
    }

    pub async fn count_for_run<'e>(db: impl PgExecutor<'e>, run_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM service_run_attached_requests WHERE run_id = $1")
                .bind(run_id)
                .fetch_one(db)
                .await?;
        Ok(row.0)
    }
}
