use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use n3_core::types::DbId;
use n3_db::models::schedule_proposal::CreateProposalEvent;

use crate::engine::negotiation;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /service-runs/{id}/schedule-proposals
pub async fn create_proposal(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Json(body): Json<CreateProposalEvent>,
) -> AppResult<impl IntoResponse> {
    let event = negotiation::create_proposal(&state, run_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: event })))
}

/// GET /service-runs/{id}/schedule-proposals
pub async fn get_thread(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let thread = negotiation::get_thread(&state, run_id).await?;
    Ok(Json(DataResponse { data: thread }))
}
