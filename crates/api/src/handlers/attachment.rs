//! Handlers for eligible requests and run attachments.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use n3_core::types::DbId;
use n3_db::models::maintenance_request::{AttachmentBatch, EligibleRequestParams};

use crate::engine::attachment;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /service-runs/{id}/eligible-requests
pub async fn list_eligible(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<EligibleRequestParams>,
) -> AppResult<impl IntoResponse> {
    let requests = attachment::list_eligible(&state, id, &params).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// POST /service-runs/{id}/attachments
pub async fn attach(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<AttachmentBatch>,
) -> AppResult<impl IntoResponse> {
    let result = attachment::attach(&state, id, &body.request_ids).await?;
    Ok(Json(DataResponse { data: result }))
}

/// POST /service-runs/{id}/attachments/detach
pub async fn detach(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<AttachmentBatch>,
) -> AppResult<impl IntoResponse> {
    let result = attachment::detach(&state, id, &body.request_ids).await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /service-runs/{id}/attachments
pub async fn list_attached(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let attached = attachment::list_attached(&state, id).await?;
    Ok(Json(DataResponse { data: attached }))
}
