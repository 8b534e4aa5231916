//! PostgreSQL persistence for the N3 coordination engine.
//!
//! Models live in [`models`], one zero-sized repository struct per table
//! group in [`repositories`]. Per-run serialisation goes through
//! [`lock_run`].

use sqlx::postgres::PgPoolOptions;
use sqlx::PgConnection;

use n3_core::types::DbId;

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// First key of every run advisory lock. The second key is the run id.
pub const RUN_LOCK_NAMESPACE: i32 = 0x4E33;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Take the transaction-scoped advisory lock for one run.
///
/// Released automatically on commit or rollback. Mutations on the same run
/// queue behind each other; different runs never contend.
pub async fn lock_run(conn: &mut PgConnection, run_id: DbId) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(RUN_LOCK_NAMESPACE)
        .bind(run_key(run_id))
        .execute(conn)
        .await?;
    Ok(())
}

/// Switch the current transaction to a consistent read-only view.
///
/// Must be the first statement in the transaction.
pub async fn begin_snapshot_read(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(conn)
        .await?;
    Ok(())
}

/// Fold a run id into the 32-bit second key of the two-key advisory lock.
fn run_key(run_id: DbId) -> i32 {
    (run_id ^ (run_id >> 32)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ids_map_to_themselves() {
        assert_eq!(run_key(1), 1);
        assert_eq!(run_key(123_456), 123_456);
    }

    #[test]
    fn large_ids_fold_high_bits() {
        assert_ne!(run_key(1 << 32), 0);
    }
}
