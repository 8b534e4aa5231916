//! Repository for the `maintenance_requests` table.
//!
//! The engine only reads requests. The write methods exist for the
//! upstream sync and for seeding tests.

use sqlx::PgExecutor;

use n3_core::drift::{ACTIVE_REQUEST_STATUSES, REQUEST_STATUS_OPEN};
use n3_core::types::{DbId, Timestamp};

use crate::models::maintenance_request::{
    CreateMaintenanceRequest, EligibleRequestParams, MaintenanceRequest,
};

const COLUMNS: &str = "id, portal_id, zone_id, title, category, status, \
     coordination_opt_in, coordination_opt_in_at, created_at, updated_at";

pub struct MaintenanceRequestRepo;

impl MaintenanceRequestRepo {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        input: &CreateMaintenanceRequest,
    ) -> Result<MaintenanceRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO maintenance_requests \
                (portal_id, zone_id, title, category, status, \
                 coordination_opt_in, coordination_opt_in_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(input.portal_id)
            .bind(input.zone_id)
            .bind(&input.title)
            .bind(&input.category)
            .bind(input.status.as_deref().unwrap_or(REQUEST_STATUS_OPEN))
            .bind(input.coordination_opt_in)
            .bind(input.coordination_opt_in_at)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_ids<'e>(
        db: impl PgExecutor<'e>,
        ids: &[DbId],
    ) -> Result<Vec<MaintenanceRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM maintenance_requests WHERE id = ANY($1) ORDER BY id"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(ids)
            .fetch_all(db)
            .await
    }

    /// Opted-in, active requests in a portal.
    ///
    /// `zone_id = None` matches only unzoned requests. Requests attached to
    /// `run_id` are skipped unless `params.include_attached` is set.
    pub async fn list_eligible<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        portal_id: DbId,
        zone_id: Option<DbId>,
        params: &EligibleRequestParams,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MaintenanceRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM maintenance_requests \
             WHERE coordination_opt_in \
               AND status = ANY($3::TEXT[]) \
               AND portal_id = $1 \
               AND zone_id IS NOT DISTINCT FROM $2::BIGINT \
               AND ($4::TEXT IS NULL OR category = $4) \
               AND ($5 OR NOT EXISTS ( \
                    SELECT 1 FROM service_run_attached_requests a \
                    WHERE a.run_id = $6 AND a.request_id = maintenance_requests.id)) \
             ORDER BY id \
             LIMIT $7 OFFSET $8"
        );
        let active: Vec<&str> = ACTIVE_REQUEST_STATUSES.to_vec();
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(portal_id)
            .bind(zone_id)
            .bind(active)
            .bind(params.category.as_deref())
            .bind(params.include_attached)
            .bind(run_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }

    /// Set the coordination opt-in flag. Opting in stamps the time.
    pub async fn set_coordination_opt_in<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        opt_in: bool,
        opt_in_at: Option<Timestamp>,
    ) -> Result<Option<MaintenanceRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE maintenance_requests SET \
                coordination_opt_in = $2, \
                coordination_opt_in_at = CASE WHEN $2 THEN COALESCE($3, NOW()) \
                                              ELSE coordination_opt_in_at END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(id)
            .bind(opt_in)
            .bind(opt_in_at)
            .fetch_optional(db)
            .await
    }

    pub async fn set_status<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        status: &str,
    ) -> Result<Option<MaintenanceRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE maintenance_requests SET status = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(db)
            .await
    }

    pub async fn set_zone<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        zone_id: Option<DbId>,
    ) -> Result<Option<MaintenanceRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE maintenance_requests SET zone_id = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(id)
            .bind(zone_id)
            .fetch_optional(db)
            .await
    }
}
