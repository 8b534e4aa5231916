//! Handlers for segments, signals, risk evaluation and replan bundles.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use n3_core::types::DbId;
use n3_db::models::risk::{CreateRunSegment, CreateSegmentSignal, TakeActionRequest};

use crate::engine::risk;
use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Segments and signals
// ---------------------------------------------------------------------------

/// POST /service-runs/{id}/segments
pub async fn create_segment(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Json(body): Json<CreateRunSegment>,
) -> AppResult<impl IntoResponse> {
    let segment = risk::create_segment(&state, run_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: segment })))
}

/// GET /service-runs/{id}/segments
pub async fn list_segments(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let segments = risk::list_segments(&state, run_id).await?;
    Ok(Json(DataResponse { data: segments }))
}

/// POST /segments/{id}/signals
pub async fn record_signal(
    State(state): State<AppState>,
    Path(segment_id): Path<DbId>,
    Json(body): Json<CreateSegmentSignal>,
) -> AppResult<impl IntoResponse> {
    let signal = risk::record_signal(&state, segment_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: signal })))
}

/// POST /signals/{id}/clear
pub async fn clear_signal(
    State(state): State<AppState>,
    Path(signal_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let signal = risk::clear_signal(&state, signal_id).await?;
    Ok(Json(DataResponse { data: signal }))
}

// ---------------------------------------------------------------------------
// Evaluation and monitor
// ---------------------------------------------------------------------------

/// POST /service-runs/{id}/risk/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let result = risk::trigger_evaluation(&state, run_id).await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /service-runs/{id}/risk/monitor
pub async fn monitor(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let monitor = risk::monitor_state(&state, run_id).await?;
    Ok(Json(DataResponse { data: monitor }))
}

/// GET /service-runs/{id}/risk/bundles
pub async fn list_bundles(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let bundles = risk::list_bundles(&state, run_id, params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: bundles }))
}

/// GET /service-runs/{id}/risk/bundles/open
///
/// `data` is null when the run has no open bundle.
pub async fn open_bundle(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let bundle = risk::get_open_bundle(&state, run_id).await?;
    Ok(Json(DataResponse { data: bundle }))
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

/// GET /replan-bundles/{id}
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(bundle_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let bundle = risk::get_bundle(&state, bundle_id).await?;
    Ok(Json(DataResponse { data: bundle }))
}

/// POST /replan-bundles/{id}/actions
pub async fn take_action(
    State(state): State<AppState>,
    Path(bundle_id): Path<DbId>,
    Json(body): Json<TakeActionRequest>,
) -> AppResult<impl IntoResponse> {
    let result = risk::take_action(&state, bundle_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// POST /replan-bundles/{id}/dismiss
pub async fn dismiss(
    State(state): State<AppState>,
    Path(bundle_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let bundle = risk::dismiss(&state, bundle_id).await?;
    Ok(Json(DataResponse { data: bundle }))
}
