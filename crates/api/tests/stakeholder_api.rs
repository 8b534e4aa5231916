//! HTTP tests for stakeholder responses and provider resolutions.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{assert_error, body_json, build_test_app, create_run, get, post_json};
use n3_core::types::DbId;
use sqlx::PgPool;

async fn record_response(app: Router, run: DbId, response_type: &str) -> DbId {
    let response = post_json(
        app,
        &format!("/api/v1/service-runs/{run}/responses"),
        serde_json::json!({
            "response_type": response_type,
            "message": "Tuesday works better for us",
            "stakeholder_id": "unit-204",
            "stakeholder_name": "Unit 204",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

async fn resolve(app: Router, response_id: DbId, body: serde_json::Value) -> serde_json::Value {
    let response = post_json(app, &format!("/api/v1/responses/{response_id}/resolutions"), body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn response_validation(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Responses").await;
    let uri = format!("/api/v1/service-runs/{run}/responses");

    let response = post_json(
        app.clone(),
        &uri,
        serde_json::json!({ "response_type": "complaint", "message": "hi", "stakeholder_id": "u1" }),
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    let response = post_json(
        app,
        &uri,
        serde_json::json!({ "response_type": "question", "message": "   ", "stakeholder_id": "u1" }),
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn latest_resolution_is_current(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Resolutions").await;
    let response_id = record_response(app.clone(), run, "question").await;

    resolve(app.clone(), response_id, serde_json::json!({ "resolution_type": "acknowledged" })).await;
    let second = resolve(
        app.clone(),
        response_id,
        serde_json::json!({ "resolution_type": "accepted", "message": "Confirmed" }),
    )
    .await;
    assert!(second["data"]["proposal_attempt"].is_null());

    let json = body_json(get(app.clone(), &format!("/api/v1/service-runs/{run}/responses")).await).await;
    let listed = &json["data"][0];
    assert_eq!(listed["id"], response_id);
    assert_eq!(listed["current_resolution"]["id"], second["data"]["resolution"]["id"]);
    assert_eq!(listed["current_resolution"]["resolution_type"], "accepted");

    let json = body_json(get(app, &format!("/api/v1/responses/{response_id}/resolutions")).await).await;
    let history: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["resolution_type"].as_str().unwrap())
        .collect();
    assert_eq!(history, vec!["acknowledged", "accepted"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn resolving_unknown_response_is_404(pool: PgPool) {
    let app = build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/responses/999999/resolutions",
        serde_json::json!({ "resolution_type": "acknowledged" }),
    )
    .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

// ---------------------------------------------------------------------------
// proposed_change
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn proposed_change_opens_thread_with_context(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Change").await;
    let response_id = record_response(app.clone(), run, "request_change").await;

    let json = resolve(
        app.clone(),
        response_id,
        serde_json::json!({
            "resolution_type": "proposed_change",
            "proposal": {
                "proposed_start": "2026-11-03T08:00:00Z",
                "proposed_end": "2026-11-03T16:00:00Z",
                "proposal_context": { "source": "front desk" },
            },
        }),
    )
    .await;
    let attempt = &json["data"]["proposal_attempt"];
    assert_eq!(attempt["outcome"], "created");
    let event = &attempt["event"];
    assert_eq!(event["event_type"], "proposed");
    assert_eq!(event["actor_role"], "provider");
    assert_eq!(event["actor_id"], "provider");
    assert_eq!(event["proposal_context"]["source"], "front desk");
    assert_eq!(event["proposal_context"]["stakeholder_response_id"], response_id);
    assert_eq!(
        event["proposal_context"]["resolution_id"],
        json["data"]["resolution"]["id"]
    );

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/schedule-proposals")).await).await;
    assert_eq!(json["data"]["turns_used"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn proposed_change_keeps_non_object_context(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "List context").await;
    let response_id = record_response(app.clone(), run, "request_change").await;

    let json = resolve(
        app,
        response_id,
        serde_json::json!({
            "resolution_type": "proposed_change",
            "proposal": { "proposal_context": ["estimate-12", "bid-3"] },
        }),
    )
    .await;
    let context = &json["data"]["proposal_attempt"]["event"]["proposal_context"];
    assert_eq!(context["caller_context"], serde_json::json!(["estimate-12", "bid-3"]));
    assert_eq!(context["stakeholder_response_id"], response_id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn proposed_change_without_window_uses_run_window(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Fallback").await;
    let response_id = record_response(app.clone(), run, "request_change").await;

    let json = resolve(
        app,
        response_id,
        serde_json::json!({ "resolution_type": "proposed_change" }),
    )
    .await;
    let event = &json["data"]["proposal_attempt"]["event"];
    let start: chrono::DateTime<chrono::Utc> = event["proposed_start"].as_str().unwrap().parse().unwrap();
    assert_eq!(start, "2026-11-02T08:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn proposed_change_on_closed_thread_keeps_resolution(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Closed thread").await;
    let thread_uri = format!("/api/v1/service-runs/{run}/schedule-proposals");
    post_json(
        app.clone(),
        &thread_uri,
        serde_json::json!({
            "actor_role": "provider",
            "actor_id": "p-1",
            "event_type": "proposed",
            "proposed_start": "2026-11-02T09:00:00Z",
            "proposed_end": "2026-11-02T12:00:00Z",
        }),
    )
    .await;
    post_json(
        app.clone(),
        &thread_uri,
        serde_json::json!({ "actor_role": "stakeholder", "actor_id": "s-1", "event_type": "accepted" }),
    )
    .await;

    let response_id = record_response(app.clone(), run, "request_change").await;
    let json = resolve(
        app.clone(),
        response_id,
        serde_json::json!({ "resolution_type": "proposed_change" }),
    )
    .await;
    let attempt = &json["data"]["proposal_attempt"];
    assert_eq!(attempt["outcome"], "failed");
    assert_eq!(attempt["error"]["code"], "THREAD_CLOSED");
    assert_eq!(attempt["error"]["kind"], "conflict");

    let json = body_json(get(app.clone(), &format!("/api/v1/service-runs/{run}/responses")).await).await;
    assert_eq!(
        json["data"][0]["current_resolution"]["resolution_type"],
        "proposed_change"
    );

    let json = body_json(get(app, &thread_uri).await).await;
    assert_eq!(json["data"]["events"].as_array().unwrap().len(), 2);
}
