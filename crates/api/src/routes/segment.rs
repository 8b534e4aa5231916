//! Signal intake routes.
//!
//! ```text
//! POST   /segments/{id}/signals         record_signal
//! POST   /signals/{id}/clear            clear_signal
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::risk;
use crate::state::AppState;

/// Mounted at `/segments`.
pub fn segment_router() -> Router<AppState> {
    Router::new().route("/{id}/signals", post(risk::record_signal))
}

/// Mounted at `/signals`.
pub fn signal_router() -> Router<AppState> {
    Router::new().route("/{id}/clear", post(risk::clear_signal))
}
