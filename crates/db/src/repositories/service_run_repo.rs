//! Repository for the `service_runs` and `service_run_status_history` tables.

use sqlx::PgExecutor;

use n3_core::lifecycle::RUN_STATUS_DRAFT;
use n3_core::types::{DbId, Timestamp};

use crate::models::service_run::{
    CreateServiceRun, ServiceRun, StatusHistoryEntry, UpdateServiceRun,
};

const COLUMNS: &str = "id, name, description, status, portal_id, zone_id, \
     starts_at, ends_at, expected_request_count, estimate_ref, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, run_id, from_status, to_status, note, changed_at";

/// Provides CRUD operations for service runs.
pub struct ServiceRunRepo;

impl ServiceRunRepo {
    /// Insert a new run in draft status.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        input: &CreateServiceRun,
    ) -> Result<ServiceRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO service_runs \
                (name, description, status, portal_id, zone_id, starts_at, ends_at, \
                 expected_request_count, estimate_ref) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRun>(&query)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(RUN_STATUS_DRAFT)
            .bind(input.portal_id)
            .bind(input.zone_id)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .bind(input.expected_request_count)
            .bind(&input.estimate_ref)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<ServiceRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM service_runs WHERE id = $1");
        sqlx::query_as::<_, ServiceRun>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// List runs, newest first, optionally filtered by status and portal.
    pub async fn list<'e>(
        db: impl PgExecutor<'e>,
        status: Option<&str>,
        portal_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ServiceRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM service_runs \
             WHERE ($1::TEXT IS NULL OR status = $1) \
               AND ($2::BIGINT IS NULL OR portal_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, ServiceRun>(&query)
            .bind(status)
            .bind(portal_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }

    /// Patch descriptive fields and the window. Only non-`None` fields are
    /// written.
    pub async fn update<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        input: &UpdateServiceRun,
    ) -> Result<Option<ServiceRun>, sqlx::Error> {
        let query = format!(
            "UPDATE service_runs SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                starts_at = COALESCE($4, starts_at), \
                ends_at = COALESCE($5, ends_at), \
                expected_request_count = COALESCE($6, expected_request_count), \
                estimate_ref = COALESCE($7, estimate_ref) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRun>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(input.starts_at)
            .bind(input.ends_at)
            .bind(input.expected_request_count)
            .bind(&input.estimate_ref)
            .fetch_optional(db)
            .await
    }

    /// Write portal and zone exactly as given.
    pub async fn set_location<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        portal_id: Option<DbId>,
        zone_id: Option<DbId>,
    ) -> Result<Option<ServiceRun>, sqlx::Error> {
        let query = format!(
            "UPDATE service_runs SET portal_id = $2, zone_id = $3 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRun>(&query)
            .bind(id)
            .bind(portal_id)
            .bind(zone_id)
            .fetch_optional(db)
            .await
    }

    pub async fn set_status<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        status: &str,
    ) -> Result<Option<ServiceRun>, sqlx::Error> {
        let query = format!(
            "UPDATE service_runs SET status = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRun>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(db)
            .await
    }

    pub async fn set_window<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        starts_at: Timestamp,
        ends_at: Timestamp,
    ) -> Result<Option<ServiceRun>, sqlx::Error> {
        let query = format!(
            "UPDATE service_runs SET starts_at = $2, ends_at = $3 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRun>(&query)
            .bind(id)
            .bind(starts_at)
            .bind(ends_at)
            .fetch_optional(db)
            .await
    }

    // -----------------------------------------------------------------------
    // Status history
    // -----------------------------------------------------------------------

    pub async fn record_status_change<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        from_status: Option<&str>,
        to_status: &str,
        note: Option<&str>,
    ) -> Result<StatusHistoryEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO service_run_status_history (run_id, from_status, to_status, note) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {HISTORY_COLUMNS}"
        );
        sqlx::query_as::<_, StatusHistoryEntry>(&query)
            .bind(run_id)
            .bind(from_status)
            .bind(to_status)
            .bind(note)
            .fetch_one(db)
            .await
    }

    /// Status changes for a run, oldest first.
    pub async fn list_status_history<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {HISTORY_COLUMNS} FROM service_run_status_history \
             WHERE run_id = $1 \
             ORDER BY changed_at, id"
        );
        sqlx::query_as::<_, StatusHistoryEntry>(&query)
            .bind(run_id)
            .fetch_all(db)
            .await
    }
}
