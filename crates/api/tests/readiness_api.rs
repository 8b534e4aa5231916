//! HTTP tests for the readiness summary, snapshot lock, execution
//! eligibility and handoff.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{
    assert_error, attach, body_json, build_test_app, create_run, delete, get, post_empty,
    post_json, put_json, seed_requests,
};
use n3_core::types::DbId;
use n3_db::repositories::{MaintenanceRequestRepo, ServiceRunRepo};
use sqlx::PgPool;

async fn attach_all(app: Router, run: DbId, ids: &[DbId]) {
    for chunk in ids.chunks(10) {
        assert_eq!(attach(app.clone(), run, chunk).await.status(), StatusCode::OK);
    }
}

async fn lock(app: Router, run: DbId) -> serde_json::Value {
    let response = post_empty(app, &format!("/api/v1/service-runs/{run}/snapshot")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Summary and coverage
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn small_sample_coverage_is_not_yet_measurable(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Sparse").await;
    put_json(
        app.clone(),
        &format!("/api/v1/service-runs/{run}"),
        serde_json::json!({ "expected_request_count": 100 }),
    )
    .await;
    let ids = seed_requests(&pool, 25).await;
    attach_all(app.clone(), run, &ids).await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/readiness")).await).await;
    let data = &json["data"];
    assert_eq!(data["attached_count"], 25);
    assert_eq!(data["coord_ready_count"], 25);
    assert_eq!(data["coverage"]["state"], "not_yet_measurable");
    assert!(data["coverage"].get("pct").is_none());
    assert_eq!(data["is_locked"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn coverage_is_measured_past_the_floor(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Dense").await;
    put_json(
        app.clone(),
        &format!("/api/v1/service-runs/{run}"),
        serde_json::json!({ "expected_request_count": 40 }),
    )
    .await;
    let ids = seed_requests(&pool, 32).await;
    attach_all(app.clone(), run, &ids).await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/readiness")).await).await;
    let coverage = &json["data"]["coverage"];
    assert_eq!(coverage["state"], "measured");
    assert_eq!(coverage["pct"], 80.0);
    assert_eq!(coverage["meets_target"], true);
}

// ---------------------------------------------------------------------------
// Snapshot lock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_lock_conflicts_and_keeps_first_snapshot(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Locked").await;
    let first = lock(app.clone(), run).await;

    let response = post_empty(app.clone(), &format!("/api/v1/service-runs/{run}/snapshot")).await;
    assert_error(response, StatusCode::CONFLICT, "ALREADY_LOCKED").await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/snapshot")).await).await;
    assert_eq!(json["data"]["id"], first["data"]["id"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn snapshot_is_not_touched_by_later_attachment_changes(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Frozen").await;
    let ids = seed_requests(&pool, 5).await;
    attach_all(app.clone(), run, &ids[..3]).await;
    lock(app.clone(), run).await;

    attach_all(app.clone(), run, &ids[3..]).await;
    post_json(
        app.clone(),
        &format!("/api/v1/service-runs/{run}/attachments/detach"),
        serde_json::json!({ "request_ids": [ids[0]] }),
    )
    .await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/snapshot")).await).await;
    let payload = &json["data"]["payload"];
    assert_eq!(payload["summary"]["attached_count"], 3);
    let captured: Vec<i64> = payload["requests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["request_id"].as_i64().unwrap())
        .collect();
    assert_eq!(captured, ids[..3].to_vec());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unlock_allows_relock(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Relock").await;
    let uri = format!("/api/v1/service-runs/{run}/snapshot");

    let response = delete(app.clone(), &uri).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    lock(app.clone(), run).await;
    assert_eq!(delete(app.clone(), &uri).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(get(app.clone(), &uri).await.status(), StatusCode::NOT_FOUND);
    lock(app, run).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn lock_requires_planning_state(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Late").await;
    ServiceRunRepo::set_status(&pool, run, "completed").await.unwrap();

    let response = post_empty(app, &format!("/api/v1/service-runs/{run}/snapshot")).await;
    assert_error(response, StatusCode::CONFLICT, "INVALID_RUN_STATE").await;
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn eligibility_before_lock_is_no_snapshot(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Unlocked").await;

    let response = get(app, &format!("/api/v1/service-runs/{run}/eligibility")).await;
    assert_error(response, StatusCode::CONFLICT, "NO_SNAPSHOT").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unchanged_run_is_unchanged(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Steady").await;
    let ids = seed_requests(&pool, 2).await;
    attach_all(app.clone(), run, &ids).await;
    lock(app.clone(), run).await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/eligibility")).await).await;
    assert_eq!(json["data"]["overall"], "unchanged");
    assert_eq!(json["data"]["coordination"]["attached_count_delta"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn opt_outs_after_lock_degrade_eligibility(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Opt outs").await;
    let ids = seed_requests(&pool, 5).await;
    attach_all(app.clone(), run, &ids).await;
    lock(app.clone(), run).await;

    for id in &ids[..2] {
        MaintenanceRequestRepo::set_coordination_opt_in(&pool, *id, false, None)
            .await
            .unwrap();
    }

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/eligibility")).await).await;
    let data = &json["data"];
    assert_eq!(data["overall"], "degraded");
    assert_eq!(data["coordination"]["coord_ready_count_at_lock"], 5);
    assert_eq!(data["coordination"]["coord_ready_count_now"], 3);
    assert_eq!(data["coordination"]["coord_ready_count_delta"], -2);
    assert_eq!(data["coordination"]["attached_count_delta"], 0);

    let opt_out = data["drift"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["category"] == "coordination_opt_out")
        .unwrap();
    assert_eq!(opt_out["delta"], 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn attaching_more_after_lock_improves_eligibility(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Growing").await;
    let ids = seed_requests(&pool, 3).await;
    attach_all(app.clone(), run, &ids[..1]).await;
    lock(app.clone(), run).await;
    attach_all(app.clone(), run, &ids[1..]).await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/eligibility")).await).await;
    assert_eq!(json["data"]["overall"], "improved");
    assert_eq!(json["data"]["coordination"]["attached_count_delta"], 2);
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn handoff_without_snapshot_is_no_snapshot(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Eager").await;

    let response = post_empty(app, &format!("/api/v1/service-runs/{run}/handoff")).await;
    assert_error(response, StatusCode::CONFLICT, "NO_SNAPSHOT").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn handoff_happens_once(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Handoff").await;
    let ids = seed_requests(&pool, 2).await;
    attach_all(app.clone(), run, &ids).await;
    lock(app.clone(), run).await;

    let uri = format!("/api/v1/service-runs/{run}/handoff");
    let response = post_json(app.clone(), &uri, serde_json::json!({ "note": "go" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["note"], "go");
    assert_eq!(json["data"]["eligibility"]["overall"], "unchanged");

    let response = post_empty(app.clone(), &uri).await;
    assert_error(response, StatusCode::CONFLICT, "ALREADY_EXISTS").await;

    let json = body_json(get(app.clone(), &uri).await).await;
    assert_eq!(json["data"]["run_id"], run);

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/readiness")).await).await;
    assert_eq!(json["data"]["is_locked"], true);
    assert_eq!(json["data"]["has_handoff"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn handoff_keeps_eligibility_from_creation(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Frozen").await;
    let ids = seed_requests(&pool, 3).await;
    attach_all(app.clone(), run, &ids).await;
    lock(app.clone(), run).await;

    let uri = format!("/api/v1/service-runs/{run}/handoff");
    let response = post_empty(app.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    MaintenanceRequestRepo::set_coordination_opt_in(&pool, ids[0], false, None)
        .await
        .unwrap();

    let response = get(app.clone(), &format!("/api/v1/service-runs/{run}/eligibility")).await;
    assert_eq!(body_json(response).await["data"]["overall"], "degraded");

    let json = body_json(get(app, &uri).await).await;
    let eligibility = &json["data"]["eligibility"];
    assert_eq!(eligibility["overall"], "unchanged");
    assert_eq!(eligibility["coordination"]["coord_ready_count_now"], 3);
    assert_eq!(eligibility["coordination"]["coord_ready_count_delta"], 0);
}
