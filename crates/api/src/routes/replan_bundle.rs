//! ```text
//! GET    /{id}                          get_bundle
//! POST   /{id}/actions                  take_action
//! POST   /{id}/dismiss                  dismiss
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::risk;
use crate::state::AppState;

/// Mounted at `/replan-bundles`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(risk::get_bundle))
        .route("/{id}/actions", post(risk::take_action))
        .route("/{id}/dismiss", post(risk::dismiss))
}
