//! Persisted coordination event rows.

use serde::Serialize;
use sqlx::FromRow;

use n3_core::types::{DbId, Timestamp};

/// A row from the `coordination_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredEvent {
    pub id: DbId,
    pub event_type: String,
    pub run_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
