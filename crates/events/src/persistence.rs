//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`CoordinationEvent`] to the
//! `coordination_events` table. It exits when the bus sender is dropped.

use tokio::sync::broadcast;

use n3_core::types::DbId;
use n3_db::repositories::EventRepo;
use n3_db::DbPool;

use crate::bus::CoordinationEvent;

pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<CoordinationEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            run_id = ?event.run_id,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write one event to the `coordination_events` table.
    pub async fn persist(pool: &DbPool, event: &CoordinationEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(pool, &event.event_type, event.run_id, &event.payload).await
    }
}
