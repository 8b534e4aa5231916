//! Repository for the `stakeholder_responses` and `stakeholder_resolutions`
//! tables.

use sqlx::PgExecutor;

use n3_core::types::DbId;

use crate::models::stakeholder::{CreateStakeholderResponse, Resolution, StakeholderResponse};

const COLUMNS: &str = "id, run_id, response_type, message, stakeholder_id, \
     stakeholder_name, responded_at, current_resolution_id";

const RESOLUTION_COLUMNS: &str = "id, response_id, resolution_type, message, resolved_at";

pub struct StakeholderRepo;

impl StakeholderRepo {
    pub async fn create_response<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        input: &CreateStakeholderResponse,
    ) -> Result<StakeholderResponse, sqlx::Error> {
        let query = format!(
            "INSERT INTO stakeholder_responses \
                (run_id, response_type, message, stakeholder_id, stakeholder_name) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StakeholderResponse>(&query)
            .bind(run_id)
            .bind(&input.response_type)
            .bind(&input.message)
            .bind(&input.stakeholder_id)
            .bind(&input.stakeholder_name)
            .fetch_one(db)
            .await
    }

    pub async fn find_response<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<StakeholderResponse>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stakeholder_responses WHERE id = $1");
        sqlx::query_as::<_, StakeholderResponse>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Responses for a run, newest first.
    pub async fn list_responses<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StakeholderResponse>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM stakeholder_responses \
             WHERE run_id = $1 \
             ORDER BY responded_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, StakeholderResponse>(&query)
            .bind(run_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }

    // -----------------------------------------------------------------------
    // Resolutions
    // -----------------------------------------------------------------------

    pub async fn create_resolution<'e>(
        db: impl PgExecutor<'e>,
        response_id: DbId,
        resolution_type: &str,
        message: Option<&str>,
    ) -> Result<Resolution, sqlx::Error> {
        let query = format!(
            "INSERT INTO stakeholder_resolutions (response_id, resolution_type, message) \
             VALUES ($1, $2, $3) \
             RETURNING {RESOLUTION_COLUMNS}"
        );
        sqlx::query_as::<_, Resolution>(&query)
            .bind(response_id)
            .bind(resolution_type)
            .bind(message)
            .fetch_one(db)
            .await
    }

    /// Point the response at its newest resolution.
    pub async fn set_current_resolution<'e>(
        db: impl PgExecutor<'e>,
        response_id: DbId,
        resolution_id: DbId,
    ) -> Result<Option<StakeholderResponse>, sqlx::Error> {
        let query = format!(
            "UPDATE stakeholder_responses SET current_resolution_id = $2 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StakeholderResponse>(&query)
            .bind(response_id)
            .bind(resolution_id)
            .fetch_optional(db)
            .await
    }

    /// Resolutions of one response, oldest first.
    pub async fn list_resolutions<'e>(
        db: impl PgExecutor<'e>,
        response_id: DbId,
    ) -> Result<Vec<Resolution>, sqlx::Error> {
        let query = format!(
            "SELECT {RESOLUTION_COLUMNS} FROM stakeholder_resolutions \
             WHERE response_id = $1 \
             ORDER BY resolved_at, id"
        );
        sqlx::query_as::<_, Resolution>(&query)
            .bind(response_id)
            .fetch_all(db)
            .await
    }

    pub async fn find_resolutions_by_ids<'e>(
        db: impl PgExecutor<'e>,
        ids: &[DbId],
    ) -> Result<Vec<Resolution>, sqlx::Error> {
        let query = format!(
            "SELECT {RESOLUTION_COLUMNS} FROM stakeholder_resolutions WHERE id = ANY($1)"
        );
        sqlx::query_as::<_, Resolution>(&query)
            .bind(ids)
            .fetch_all(db)
            .await
    }
}
