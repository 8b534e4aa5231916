//! Route definitions for service runs and everything scoped to one run.
//!
//! ```text
//! POST   /                              create_run
//! GET    /                              list_runs (?status, portal_id, limit, offset)
//! GET    /{id}                          get_run
//! PUT    /{id}                          update_run
//! PUT    /{id}/location                 set_location
//! POST   /{id}/promote                  promote
//! POST   /{id}/demote                   demote
//! GET    /{id}/status-history           status_history
//! GET    /{id}/eligible-requests        list_eligible (?category, include_unzoned, include_attached)
//! GET    /{id}/attachments              list_attached
//! POST   /{id}/attachments              attach
//! POST   /{id}/attachments/detach       detach
//! GET    /{id}/drift                    drift
//! GET    /{id}/readiness                summary
//! GET    /{id}/segments                 list_segments
//! POST   /{id}/segments                 create_segment
//! POST   /{id}/risk/evaluate            evaluate
//! GET    /{id}/risk/monitor             monitor
//! GET    /{id}/risk/bundles             list_bundles
//! GET    /{id}/risk/bundles/open        open_bundle
//! POST   /{id}/snapshot                 lock
//! GET    /{id}/snapshot                 get_snapshot
//! DELETE /{id}/snapshot                 unlock
//! GET    /{id}/eligibility              eligibility
//! POST   /{id}/handoff                  create_handoff
//! GET    /{id}/handoff                  get_handoff
//! GET    /{id}/schedule-proposals       get_thread
//! POST   /{id}/schedule-proposals       create_proposal
//! GET    /{id}/responses                list_responses
//! POST   /{id}/responses                record_response
//! ```

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{attachment, negotiation, readiness, risk, service_run, stakeholder};
use crate::state::AppState;

/// Mounted at `/service-runs`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_run::list_runs).post(service_run::create_run))
        .route(
            "/{id}",
            get(service_run::get_run).put(service_run::update_run),
        )
        .route("/{id}/location", put(service_run::set_location))
        .route("/{id}/promote", post(service_run::promote))
        .route("/{id}/demote", post(service_run::demote))
        .route("/{id}/status-history", get(service_run::status_history))
        .route("/{id}/eligible-requests", get(attachment::list_eligible))
        .route(
            "/{id}/attachments",
            get(attachment::list_attached).post(attachment::attach),
        )
        .route("/{id}/attachments/detach", post(attachment::detach))
        .route("/{id}/drift", get(readiness::drift))
        .route("/{id}/readiness", get(readiness::summary))
        .route(
            "/{id}/segments",
            get(risk::list_segments).post(risk::create_segment),
        )
        .route("/{id}/risk/evaluate", post(risk::evaluate))
        .route("/{id}/risk/monitor", get(risk::monitor))
        .route("/{id}/risk/bundles", get(risk::list_bundles))
        .route("/{id}/risk/bundles/open", get(risk::open_bundle))
        .route(
            "/{id}/snapshot",
            get(readiness::get_snapshot)
                .post(readiness::lock)
                .delete(readiness::unlock),
        )
        .route("/{id}/eligibility", get(readiness::eligibility))
        .route(
            "/{id}/handoff",
            get(readiness::get_handoff).post(readiness::create_handoff),
        )
        .route(
            "/{id}/schedule-proposals",
            get(negotiation::get_thread).post(negotiation::create_proposal),
        )
        .route(
            "/{id}/responses",
            get(stakeholder::list_responses).post(stakeholder::record_response),
        )
}
