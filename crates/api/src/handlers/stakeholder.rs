use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use n3_core::types::DbId;
use n3_db::models::stakeholder::{CreateResolution, CreateStakeholderResponse};

use crate::engine::stakeholder;
use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /service-runs/{id}/responses
pub async fn record_response(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Json(body): Json<CreateStakeholderResponse>,
) -> AppResult<impl IntoResponse> {
    let response = stakeholder::record_response(&state, run_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// GET /service-runs/{id}/responses
pub async fn list_responses(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let responses =
        stakeholder::list_responses(&state, run_id, params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: responses }))
}

/// POST /responses/{id}/resolutions
///
/// Always 201 once the resolution is stored; a failed follow-up proposal
/// is reported inside the body.
pub async fn resolve(
    State(state): State<AppState>,
    Path(response_id): Path<DbId>,
    Json(body): Json<CreateResolution>,
) -> AppResult<impl IntoResponse> {
    let result = stakeholder::resolve(&state, response_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// GET /responses/{id}/resolutions
pub async fn list_resolutions(
    State(state): State<AppState>,
    Path(response_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let resolutions = stakeholder::list_resolutions(&state, response_id).await?;
    Ok(Json(DataResponse { data: resolutions }))
}
