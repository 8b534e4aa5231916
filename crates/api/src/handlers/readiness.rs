//! Handlers for drift, readiness, snapshots, eligibility and handoff.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use n3_core::types::DbId;
use n3_db::models::readiness::NoteRequest;

use crate::engine::readiness;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

fn note_of(body: Option<Json<NoteRequest>>) -> AppResult<Option<String>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()?;
    Ok(body.note)
}

// ---------------------------------------------------------------------------
// GET /service-runs/{id}/drift
// ---------------------------------------------------------------------------

pub async fn drift(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = readiness::compute_run_drift(&state, id).await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// GET /service-runs/{id}/readiness
// ---------------------------------------------------------------------------

pub async fn summary(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = readiness::readiness_report(&state, id).await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// /service-runs/{id}/snapshot
// ---------------------------------------------------------------------------

pub async fn lock(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<NoteRequest>>,
) -> AppResult<impl IntoResponse> {
    let note = note_of(body)?;
    let snapshot = readiness::lock(&state, id, note).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: snapshot })))
}

pub async fn unlock(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    readiness::unlock(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let snapshot = readiness::get_snapshot(&state, id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// GET /service-runs/{id}/eligibility
// ---------------------------------------------------------------------------

pub async fn eligibility(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let result = readiness::evaluate_eligibility(&state, id).await?;
    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// /service-runs/{id}/handoff
// ---------------------------------------------------------------------------

pub async fn create_handoff(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<NoteRequest>>,
) -> AppResult<impl IntoResponse> {
    let note = note_of(body)?;
    let handoff = readiness::create_handoff(&state, id, note).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: handoff })))
}

pub async fn get_handoff(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let handoff = readiness::get_handoff(&state, id).await?;
    Ok(Json(DataResponse { data: handoff }))
}
