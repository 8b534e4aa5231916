//! Repository for replan bundles, their options and actions, and the
//! per-run monitor state.

use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};

use n3_core::risk::{OptionDraft, BUNDLE_STATUS_OPEN};
use n3_core::types::{DbId, Timestamp};

use crate::models::risk::{MonitorState, ReplanBundle, ReplanOption, ReplanOptionAction};

const COLUMNS: &str =
    "id, run_id, status, findings, risk_score, risk_delta, created_at, closed_at";

const OPTION_COLUMNS: &str = "id, bundle_id, position, description, effect";

const ACTION_COLUMNS: &str = "id, option_id, bundle_id, action_kind, note, created_at";

const MONITOR_COLUMNS: &str = "run_id, last_checked_at, next_check_at, last_risk_score, last_band";

pub struct ReplanBundleRepo;

impl ReplanBundleRepo {
    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<ReplanBundle>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM replan_bundles WHERE id = $1");
        sqlx::query_as::<_, ReplanBundle>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_open_for_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Option<ReplanBundle>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM replan_bundles WHERE run_id = $1 AND status = $2"
        );
        sqlx::query_as::<_, ReplanBundle>(&query)
            .bind(run_id)
            .bind(BUNDLE_STATUS_OPEN)
            .fetch_optional(db)
            .await
    }

    /// Bundle history for a run, newest first.
    pub async fn list_for_run<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReplanBundle>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM replan_bundles \
             WHERE run_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ReplanBundle>(&query)
            .bind(run_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }

    /// Insert an open bundle and its options.
    pub async fn create_with_options(
        conn: &mut PgConnection,
        run_id: DbId,
        findings: &serde_json::Value,
        risk_score: f64,
        risk_delta: f64,
        options: &[OptionDraft],
    ) -> Result<(ReplanBundle, Vec<ReplanOption>), sqlx::Error> {
        let query = format!(
            "INSERT INTO replan_bundles (run_id, status, findings, risk_score, risk_delta) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let bundle = sqlx::query_as::<_, ReplanBundle>(&query)
            .bind(run_id)
            .bind(BUNDLE_STATUS_OPEN)
            .bind(findings)
            .bind(risk_score)
            .bind(risk_delta)
            .fetch_one(&mut *conn)
            .await?;

        let option_query = format!(
            "INSERT INTO replan_options (bundle_id, position, description, effect) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {OPTION_COLUMNS}"
        );
        let mut created = Vec::with_capacity(options.len());
        for (position, draft) in options.iter().enumerate() {
            let option = sqlx::query_as::<_, ReplanOption>(&option_query)
                .bind(bundle.id)
                .bind(position as i32)
                .bind(&draft.description)
                .bind(Json(&draft.effect))
                .fetch_one(&mut *conn)
                .await?;
            created.push(option);
        }
        Ok((bundle, created))
    }

    /// Move an open bundle to a closed status. Returns `None` if the bundle
    /// was not open.
    pub async fn close<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        status: &str,
    ) -> Result<Option<ReplanBundle>, sqlx::Error> {
        let query = format!(
            "UPDATE replan_bundles SET status = $2, closed_at = NOW() \
             WHERE id = $1 AND status = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ReplanBundle>(&query)
            .bind(id)
            .bind(status)
            .bind(BUNDLE_STATUS_OPEN)
            .fetch_optional(db)
            .await
    }

    // -----------------------------------------------------------------------
    // Options and actions
    // -----------------------------------------------------------------------

    pub async fn list_options<'e>(
        db: impl PgExecutor<'e>,
        bundle_id: DbId,
    ) -> Result<Vec<ReplanOption>, sqlx::Error> {
        let query = format!(
            "SELECT {OPTION_COLUMNS} FROM replan_options WHERE bundle_id = $1 ORDER BY position"
        );
        sqlx::query_as::<_, ReplanOption>(&query)
            .bind(bundle_id)
            .fetch_all(db)
            .await
    }

    /// Find an option only if it belongs to the bundle.
    pub async fn find_option<'e>(
        db: impl PgExecutor<'e>,
        bundle_id: DbId,
        option_id: DbId,
    ) -> Result<Option<ReplanOption>, sqlx::Error> {
        let query = format!(
            "SELECT {OPTION_COLUMNS} FROM replan_options WHERE id = $1 AND bundle_id = $2"
        );
        sqlx::query_as::<_, ReplanOption>(&query)
            .bind(option_id)
            .bind(bundle_id)
            .fetch_optional(db)
            .await
    }

    pub async fn record_action<'e>(
        db: impl PgExecutor<'e>,
        bundle_id: DbId,
        option_id: DbId,
        action_kind: &str,
        note: Option<&str>,
    ) -> Result<ReplanOptionAction, sqlx::Error> {
        let query = format!(
            "INSERT INTO replan_option_actions (option_id, bundle_id, action_kind, note) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {ACTION_COLUMNS}"
        );
        sqlx::query_as::<_, ReplanOptionAction>(&query)
            .bind(option_id)
            .bind(bundle_id)
            .bind(action_kind)
            .bind(note)
            .fetch_one(db)
            .await
    }

    pub async fn list_actions<'e>(
        db: impl PgExecutor<'e>,
        bundle_id: DbId,
    ) -> Result<Vec<ReplanOptionAction>, sqlx::Error> {
        let query = format!(
            "SELECT {ACTION_COLUMNS} FROM replan_option_actions \
             WHERE bundle_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, ReplanOptionAction>(&query)
            .bind(bundle_id)
            .fetch_all(db)
            .await
    }
}

pub struct MonitorStateRepo;

impl MonitorStateRepo {
    pub async fn find<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
    ) -> Result<Option<MonitorState>, sqlx::Error> {
        let query = format!(
            "SELECT {MONITOR_COLUMNS} FROM service_run_monitor_state WHERE run_id = $1"
        );
        sqlx::query_as::<_, MonitorState>(&query)
            .bind(run_id)
            .fetch_optional(db)
            .await
    }

    pub async fn upsert<'e>(
        db: impl PgExecutor<'e>,
        run_id: DbId,
        checked_at: Timestamp,
        next_check_at: Timestamp,
        risk_score: f64,
        band: &str,
    ) -> Result<MonitorState, sqlx::Error> {
        let query = format!(
            "INSERT INTO service_run_monitor_state \
                (run_id, last_checked_at, next_check_at, last_risk_score, last_band) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (run_id) DO UPDATE SET \
                last_checked_at = EXCLUDED.last_checked_at, \
                next_check_at = EXCLUDED.next_check_at, \
                last_risk_score = EXCLUDED.last_risk_score, \
                last_band = EXCLUDED.last_band \
             RETURNING {MONITOR_COLUMNS}"
        );
        sqlx::query_as::<_, MonitorState>(&query)
            .bind(run_id)
            .bind(checked_at)
            .bind(next_check_at)
            .bind(risk_score)
            .bind(band)
            .fetch_one(db)
            .await
    }
}
