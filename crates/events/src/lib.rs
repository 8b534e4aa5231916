//! N3 coordination event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`CoordinationEvent`]: the event envelope published after every
//!   committed mutation.
//! - [`EventPersistence`]: background service writing every event to the
//!   `coordination_events` table.

pub mod bus;
pub mod persistence;

pub use bus::{CoordinationEvent, EventBus};
pub use persistence::EventPersistence;
