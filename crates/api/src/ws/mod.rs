//! WebSocket push of coordination events.
//!
//! Clients connect to `/api/v1/ws`, optionally with `?run_id=` to receive
//! only one run's events. The forwarder relays committed events from the
//! event bus to matching connections.

mod forwarder;
mod handler;
mod heartbeat;
pub mod manager;

pub use forwarder::start_event_forwarder;
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
