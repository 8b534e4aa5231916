pub mod health;
pub mod replan_bundle;
pub mod segment;
pub mod service_run;
pub mod stakeholder;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                       WebSocket (?run_id=)
///
/// /service-runs                             list, create
/// /service-runs/{id}                        get, update
/// /service-runs/{id}/location               set portal/zone (PUT)
/// /service-runs/{id}/promote                draft -> scheduled (POST)
/// /service-runs/{id}/demote                 scheduled -> draft (POST)
/// /service-runs/{id}/status-history         audit trail
/// /service-runs/{id}/eligible-requests      attach candidates
/// /service-runs/{id}/attachments            list, attach
/// /service-runs/{id}/attachments/detach     detach (POST)
/// /service-runs/{id}/drift                  drift report
/// /service-runs/{id}/readiness              readiness summary
/// /service-runs/{id}/segments               list, create
/// /service-runs/{id}/risk/evaluate          trigger evaluation (POST)
/// /service-runs/{id}/risk/monitor           monitor state
/// /service-runs/{id}/risk/bundles           bundle history
/// /service-runs/{id}/risk/bundles/open      current open bundle
/// /service-runs/{id}/snapshot               lock (POST), get, unlock (DELETE)
/// /service-runs/{id}/eligibility            execution eligibility
/// /service-runs/{id}/handoff                create (POST), get
/// /service-runs/{id}/schedule-proposals     thread, append event
/// /service-runs/{id}/responses              list, record
///
/// /segments/{id}/signals                    record signal (POST)
/// /signals/{id}/clear                       clear signal (POST)
///
/// /replan-bundles/{id}                      get with options and actions
/// /replan-bundles/{id}/actions              take action (POST)
/// /replan-bundles/{id}/dismiss              dismiss (POST)
///
/// /responses/{id}/resolutions               list, resolve
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/service-runs", service_run::router())
        .nest("/segments", segment::segment_router())
        .nest("/signals", segment::signal_router())
        .nest("/replan-bundles", replan_bundle::router())
        .nest("/responses", stakeholder::router())
}
