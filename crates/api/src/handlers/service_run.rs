//! Handlers for service runs and their lifecycle.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use n3_core::lifecycle::RunStatus;
use n3_core::types::DbId;
use n3_db::models::service_run::{
    CreateServiceRun, ServiceRunListParams, SetLocation, TransitionRequest, UpdateServiceRun,
};
use validator::Validate;

use crate::engine::lifecycle;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /service-runs
// ---------------------------------------------------------------------------

pub async fn create_run(
    State(state): State<AppState>,
    Json(body): Json<CreateServiceRun>,
) -> AppResult<impl IntoResponse> {
    let run = lifecycle::create_run(&state, body).await?;
    tracing::info!(run_id = run.id, name = %run.name, "Service run created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

// ---------------------------------------------------------------------------
// GET /service-runs
// ---------------------------------------------------------------------------

pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<ServiceRunListParams>,
) -> AppResult<impl IntoResponse> {
    let runs = lifecycle::list_runs(&state, &params).await?;
    Ok(Json(DataResponse { data: runs }))
}

// ---------------------------------------------------------------------------
// GET /service-runs/{id}
// ---------------------------------------------------------------------------

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = lifecycle::get_run(&state, id).await?;
    Ok(Json(DataResponse { data: run }))
}

// ---------------------------------------------------------------------------
// PUT /service-runs/{id}
// ---------------------------------------------------------------------------

pub async fn update_run(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<UpdateServiceRun>,
) -> AppResult<impl IntoResponse> {
    let run = lifecycle::update_run(&state, id, body).await?;
    Ok(Json(DataResponse { data: run }))
}

// ---------------------------------------------------------------------------
// PUT /service-runs/{id}/location
// ---------------------------------------------------------------------------

pub async fn set_location(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<SetLocation>,
) -> AppResult<impl IntoResponse> {
    let run = lifecycle::set_location(&state, id, body).await?;
    Ok(Json(DataResponse { data: run }))
}

// ---------------------------------------------------------------------------
// POST /service-runs/{id}/promote, /demote
// ---------------------------------------------------------------------------

/// Promote a draft run to scheduled. Already scheduled is a no-op.
pub async fn promote(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<TransitionRequest>>,
) -> AppResult<impl IntoResponse> {
    transition(state, id, RunStatus::Scheduled, body).await
}

/// Demote a scheduled run to draft. Already draft is a no-op.
pub async fn demote(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<TransitionRequest>>,
) -> AppResult<impl IntoResponse> {
    transition(state, id, RunStatus::Draft, body).await
}

async fn transition(
    state: AppState,
    id: DbId,
    target: RunStatus,
    body: Option<Json<TransitionRequest>>,
) -> AppResult<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()?;
    let outcome = lifecycle::transition(&state, id, target, body.note).await?;
    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// GET /service-runs/{id}/status-history
// ---------------------------------------------------------------------------

pub async fn status_history(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let history = lifecycle::status_history(&state, id).await?;
    Ok(Json(DataResponse { data: history }))
}
