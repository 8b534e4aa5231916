//! HTTP tests for segments, signals, risk evaluation and replan bundles.

mod common;

use axum::http::StatusCode;
use axum::Router;
use chrono::{DateTime, Utc};
use common::{assert_error, body_json, build_test_app, create_run, get, post_empty, post_json};
use n3_core::types::DbId;
use sqlx::PgPool;

async fn create_segment(app: Router, run: DbId, sequence: i32, label: &str) -> DbId {
    let response = post_json(
        app,
        &format!("/api/v1/service-runs/{run}/segments"),
        serde_json::json!({ "sequence": sequence, "label": label }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

async fn record_signal(app: Router, segment: DbId, signal_type: &str, severity: f64) -> DbId {
    let response = post_json(
        app,
        &format!("/api/v1/segments/{segment}/signals"),
        serde_json::json!({ "signal_type": signal_type, "severity": severity }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

async fn evaluate(app: Router, run: DbId) -> serde_json::Value {
    let response = post_empty(app, &format!("/api/v1/service-runs/{run}/risk/evaluate")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

fn timestamp(value: &serde_json::Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

/// Run with one segment carrying a severe weather signal, evaluated once.
async fn run_with_open_bundle(app: Router) -> (DbId, serde_json::Value) {
    let run = create_run(app.clone(), "Stormy").await;
    let segment = create_segment(app.clone(), run, 1, "Hillside").await;
    record_signal(app.clone(), segment, "weather", 0.9).await;
    let json = evaluate(app, run).await;
    (run, json["data"]["bundle"].clone())
}

// ---------------------------------------------------------------------------
// Segments and signals
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn segments_list_in_sequence_order(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Segments").await;
    create_segment(app.clone(), run, 2, "Second").await;
    create_segment(app.clone(), run, 1, "First").await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/segments")).await).await;
    let labels: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["First", "Second"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_signals_are_rejected(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Signals").await;
    let segment = create_segment(app.clone(), run, 1, "Only").await;
    let uri = format!("/api/v1/segments/{segment}/signals");

    let response = post_json(
        app.clone(),
        &uri,
        serde_json::json!({ "signal_type": "earthquake", "severity": 0.5 }),
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    let response = post_json(
        app.clone(),
        &uri,
        serde_json::json!({ "signal_type": "weather", "severity": 1.5 }),
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    let response = post_json(
        app,
        "/api/v1/segments/999999/signals",
        serde_json::json!({ "signal_type": "weather", "severity": 0.5 }),
    )
    .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn quiet_run_scores_low_without_bundle(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Quiet").await;
    let segment = create_segment(app.clone(), run, 1, "Flat").await;
    record_signal(app.clone(), segment, "traffic", 0.1).await;

    let json = evaluate(app.clone(), run).await;
    assert_eq!(json["data"]["band"], "low");
    assert!(json["data"]["bundle"].is_null());

    let json = body_json(get(app.clone(), &format!("/api/v1/service-runs/{run}/risk/monitor")).await).await;
    assert_eq!(json["data"]["last_band"], "low");

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/risk/bundles/open")).await).await;
    assert!(json["data"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn severe_weather_opens_bundle_with_options(pool: PgPool) {
    let app = build_test_app(pool);
    let (run, bundle) = run_with_open_bundle(app.clone()).await;

    assert_eq!(bundle["status"], "open");
    assert_eq!(bundle["risk_score"], 0.9);
    let options = bundle["options"].as_array().unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0]["effect"]["kind"], "shift_window");
    assert_eq!(options[0]["effect"]["minutes"], 1440);
    assert_eq!(options[1]["effect"]["kind"], "advisory");

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/risk/monitor")).await).await;
    let monitor = &json["data"];
    assert_eq!(monitor["last_band"], "critical");
    let checked = timestamp(&monitor["last_checked_at"]);
    let next = timestamp(&monitor["next_check_at"]);
    assert_eq!((next - checked).num_minutes(), 15);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reevaluation_keeps_one_open_bundle(pool: PgPool) {
    let app = build_test_app(pool);
    let (run, first) = run_with_open_bundle(app.clone()).await;

    let json = evaluate(app.clone(), run).await;
    assert_eq!(json["data"]["dismissed_bundle_id"], first["id"]);
    let second = &json["data"]["bundle"];
    assert_ne!(second["id"], first["id"]);
    assert_eq!(second["risk_delta"], 0.0);

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/risk/bundles")).await).await;
    let bundles = json["data"].as_array().unwrap();
    assert_eq!(bundles.len(), 2);
    let open = bundles.iter().filter(|b| b["status"] == "open").count();
    assert_eq!(open, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cleared_signals_stop_contributing(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Clearing").await;
    let segment = create_segment(app.clone(), run, 1, "Bridge").await;
    let signal = record_signal(app.clone(), segment, "access", 0.7).await;
    assert!(!evaluate(app.clone(), run).await["data"]["bundle"].is_null());

    let response = post_empty(app.clone(), &format!("/api/v1/signals/{signal}/clear")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_json(response).await["data"]["cleared_at"].is_null());

    let json = evaluate(app, run).await;
    assert!(json["data"]["bundle"].is_null());
    assert!(json["data"]["dismissed_bundle_id"].is_number());
    assert_eq!(json["data"]["risk_score"], 0.0);
}

// ---------------------------------------------------------------------------
// Operator actions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_action_kind_is_rejected(pool: PgPool) {
    let app = build_test_app(pool);
    let (_, bundle) = run_with_open_bundle(app.clone()).await;
    let id = bundle["id"].as_i64().unwrap();

    let response = post_json(
        app,
        &format!("/api/v1/replan-bundles/{id}/actions"),
        serde_json::json!({ "option_id": bundle["options"][0]["id"], "action_kind": "demand" }),
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "INVALID_ACTION_KIND").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn suggest_records_without_closing(pool: PgPool) {
    let app = build_test_app(pool);
    let (_, bundle) = run_with_open_bundle(app.clone()).await;
    let id = bundle["id"].as_i64().unwrap();

    let response = post_json(
        app.clone(),
        &format!("/api/v1/replan-bundles/{id}/actions"),
        serde_json::json!({ "option_id": bundle["options"][1]["id"], "action_kind": "suggest" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["applied"], false);
    assert_eq!(json["data"]["bundle"]["status"], "open");

    let json = body_json(get(app, &format!("/api/v1/replan-bundles/{id}")).await).await;
    assert_eq!(json["data"]["actions"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["actions"][0]["action_kind"], "suggest");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dictate_shifts_window_and_closes_bundle(pool: PgPool) {
    let app = build_test_app(pool);
    let (run, bundle) = run_with_open_bundle(app.clone()).await;
    let id = bundle["id"].as_i64().unwrap();
    let uri = format!("/api/v1/replan-bundles/{id}/actions");

    let response = post_json(
        app.clone(),
        &uri,
        serde_json::json!({
            "option_id": bundle["options"][0]["id"],
            "action_kind": "dictate",
            "note": "moving a day",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["applied"], true);
    assert_eq!(json["data"]["bundle"]["status"], "actioned");

    let json = body_json(get(app.clone(), &format!("/api/v1/service-runs/{run}")).await).await;
    let starts_at = timestamp(&json["data"]["starts_at"]);
    let ends_at = timestamp(&json["data"]["ends_at"]);
    assert_eq!(starts_at, "2026-11-03T08:00:00Z".parse::<DateTime<Utc>>().unwrap());
    assert_eq!(ends_at, "2026-11-03T16:00:00Z".parse::<DateTime<Utc>>().unwrap());

    let response = post_json(
        app,
        &uri,
        serde_json::json!({ "option_id": bundle["options"][1]["id"], "action_kind": "suggest" }),
    )
    .await;
    assert_error(response, StatusCode::CONFLICT, "ALREADY_CLOSED").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dictating_a_hold_holds_the_segment(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Gate").await;
    let segment = create_segment(app.clone(), run, 1, "Gated lane").await;
    record_signal(app.clone(), segment, "access", 0.8).await;
    let bundle = evaluate(app.clone(), run).await["data"]["bundle"].clone();
    assert_eq!(bundle["options"][0]["effect"]["kind"], "hold_segment");

    let response = post_json(
        app.clone(),
        &format!("/api/v1/replan-bundles/{}/actions", bundle["id"]),
        serde_json::json!({ "option_id": bundle["options"][0]["id"], "action_kind": "dictate" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(get(app.clone(), &format!("/api/v1/service-runs/{run}/segments")).await).await;
    assert_eq!(json["data"][0]["status"], "held");

    // Held segments are left out of the next pass.
    let json = evaluate(app, run).await;
    assert!(json["data"]["bundle"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn option_from_another_bundle_is_not_found(pool: PgPool) {
    let app = build_test_app(pool);
    let (_, first) = run_with_open_bundle(app.clone()).await;
    let (_, second) = run_with_open_bundle(app.clone()).await;

    let response = post_json(
        app,
        &format!("/api/v1/replan-bundles/{}/actions", second["id"]),
        serde_json::json!({ "option_id": first["options"][0]["id"], "action_kind": "request" }),
    )
    .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dismiss_twice_is_already_closed(pool: PgPool) {
    let app = build_test_app(pool);
    let (run, bundle) = run_with_open_bundle(app.clone()).await;
    let uri = format!("/api/v1/replan-bundles/{}/dismiss", bundle["id"]);

    let response = post_empty(app.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "dismissed");

    let response = post_empty(app.clone(), &uri).await;
    assert_error(response, StatusCode::CONFLICT, "ALREADY_CLOSED").await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/risk/bundles/open")).await).await;
    assert!(json["data"].is_null());
}
