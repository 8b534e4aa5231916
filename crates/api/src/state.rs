use std::sync::Arc;

use n3_core::policy::CoordinationPolicy;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything heavy sits behind `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: n3_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Business thresholds for attachment, negotiation, drift and coverage.
    pub policy: Arc<CoordinationPolicy>,
    /// WebSocket connections subscribed to run events.
    pub ws_manager: Arc<WsManager>,
    /// Committed mutations are published here.
    pub event_bus: Arc<n3_events::EventBus>,
}
