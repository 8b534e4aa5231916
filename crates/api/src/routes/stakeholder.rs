//! ```text
//! GET    /{id}/resolutions              list_resolutions
//! POST   /{id}/resolutions              resolve
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::stakeholder;
use crate::state::AppState;

/// Mounted at `/responses`.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{id}/resolutions",
        get(stakeholder::list_resolutions).post(stakeholder::resolve),
    )
}
