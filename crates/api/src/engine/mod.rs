//! Coordination engine: the operations behind every route.
//!
//! Each mutation runs in one transaction that first takes the run's
//! advisory lock, so concurrent writes to the same run serialise while
//! different runs proceed in parallel. Reads that combine several queries
//! run in a read-only repeatable-read transaction. Events are published to
//! the bus only after commit.

pub mod attachment;
pub mod lifecycle;
pub mod negotiation;
pub mod readiness;
pub mod risk;
pub mod stakeholder;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use n3_core::error::CoreError;
use n3_core::lifecycle::RunStatus;
use n3_core::types::DbId;
use n3_db::models::service_run::ServiceRun;
use n3_db::repositories::ServiceRunRepo;
use n3_events::CoordinationEvent;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub type Tx = Transaction<'static, Postgres>;

/// Open a transaction holding the advisory lock for `run_id`.
pub async fn begin_for_run(pool: &PgPool, run_id: DbId) -> AppResult<Tx> {
    let mut tx = pool.begin().await?;
    n3_db::lock_run(&mut tx, run_id).await?;
    Ok(tx)
}

/// Open a read-only transaction with a single consistent snapshot.
pub async fn begin_read(pool: &PgPool) -> AppResult<Tx> {
    let mut tx = pool.begin().await?;
    n3_db::begin_snapshot_read(&mut tx).await?;
    Ok(tx)
}

/// Load a run or fail with `NotFound`.
pub async fn load_run(conn: &mut PgConnection, run_id: DbId) -> AppResult<ServiceRun> {
    ServiceRunRepo::find_by_id(conn, run_id)
        .await?
        .ok_or_else(|| not_found("ServiceRun", run_id))
}

pub fn run_status(run: &ServiceRun) -> AppResult<RunStatus> {
    RunStatus::from_str_value(&run.status).map_err(|_| {
        AppError::InternalError(format!(
            "Run {} has unknown status '{}'",
            run.id, run.status
        ))
    })
}

pub fn not_found(entity: &'static str, id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity, id })
}

/// Publish committed events in order.
pub fn publish_all(state: &AppState, events: Vec<CoordinationEvent>) {
    for event in events {
        state.event_bus.publish(event);
    }
}

/// Serialize a value into an event payload.
pub fn payload<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
