//! HTTP tests for eligible-request listing, attach, detach and drift.

mod common;

use axum::http::StatusCode;
use common::{
    assert_error, attach, body_json, build_test_app, create_run, get, post_json, put_json,
    seed_request, seed_request_in, seed_requests, PORTAL, ZONE,
};
use n3_db::repositories::{MaintenanceRequestRepo, ServiceRunRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Attach
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn attach_captures_and_lists(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Attach").await;
    let ids = seed_requests(&pool, 3).await;

    let response = attach(app.clone(), run, &ids).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["attached"].as_array().unwrap().len(), 3);
    assert!(json["data"]["already_attached"].as_array().unwrap().is_empty());

    let response = get(app, &format!("/api/v1/service-runs/{run}/attachments")).await;
    let json = body_json(response).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["captured_opt_in"], true);
    assert_eq!(rows[0]["captured_zone_id"], ZONE);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_over_limit_attaches_nothing(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Too many").await;
    let ids = seed_requests(&pool, 11).await;

    let response = attach(app.clone(), run, &ids).await;
    assert_error(response, StatusCode::UNPROCESSABLE_ENTITY, "LIMIT_EXCEEDED").await;

    let response = get(app, &format!("/api/v1/service-runs/{run}/attachments")).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_ids_in_one_batch_collapse(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Dupes").await;
    let id = seed_request(&pool, "Leaky tap").await.id;

    let response = attach(app, run, &[id, id, id]).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["attached"], serde_json::json!([id]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reattaching_reports_already_attached(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Again").await;
    let ids = seed_requests(&pool, 2).await;
    attach(app.clone(), run, &ids[..1]).await;

    let response = attach(app, run, &ids).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["attached"], serde_json::json!([ids[1]]));
    assert_eq!(json["data"]["already_attached"], serde_json::json!([ids[0]]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn one_ineligible_request_fails_the_batch(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Mixed").await;
    let good = seed_request(&pool, "In zone").await.id;
    let elsewhere = seed_request_in(&pool, "Other zone", PORTAL, Some(ZONE + 1)).await.id;

    let response = attach(app.clone(), run, &[good, elsewhere]).await;
    assert_error(response, StatusCode::CONFLICT, "NOT_ELIGIBLE").await;

    let response = get(app, &format!("/api/v1/service-runs/{run}/attachments")).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn opted_out_and_missing_requests_are_not_eligible(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Strict").await;
    let id = seed_request(&pool, "Shy").await.id;
    MaintenanceRequestRepo::set_coordination_opt_in(&pool, id, false, None)
        .await
        .unwrap();

    let response = attach(app.clone(), run, &[id]).await;
    assert_error(response, StatusCode::CONFLICT, "NOT_ELIGIBLE").await;

    let response = attach(app, run, &[987_654]).await;
    assert_error(response, StatusCode::CONFLICT, "NOT_ELIGIBLE").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn attach_requires_planning_state(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Closed").await;
    let ids = seed_requests(&pool, 1).await;
    ServiceRunRepo::set_status(&pool, run, "in_progress").await.unwrap();

    let response = attach(app, run, &ids).await;
    assert_error(response, StatusCode::CONFLICT, "INVALID_RUN_STATE").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_batch_is_rejected(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Empty").await;

    let response = attach(app, run, &[]).await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

// ---------------------------------------------------------------------------
// Detach
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn detach_unattached_id_is_404_and_detaches_nothing(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Detach").await;
    let ids = seed_requests(&pool, 2).await;
    attach(app.clone(), run, &ids[..1]).await;

    let uri = format!("/api/v1/service-runs/{run}/attachments/detach");
    let response = post_json(app.clone(), &uri, serde_json::json!({ "request_ids": ids })).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let response = post_json(app.clone(), &uri, serde_json::json!({ "request_ids": [ids[0]] })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"]["detached"],
        serde_json::json!([ids[0]])
    );

    let response = get(app, &format!("/api/v1/service-runs/{run}/attachments")).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Eligible listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn eligible_listing_skips_attached_and_out_of_zone(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Listing").await;
    let ids = seed_requests(&pool, 3).await;
    seed_request_in(&pool, "Other zone", PORTAL, Some(ZONE + 1)).await;
    seed_request_in(&pool, "Other portal", PORTAL + 1, Some(ZONE)).await;
    attach(app.clone(), run, &ids[..1]).await;

    let uri = format!("/api/v1/service-runs/{run}/eligible-requests");
    let json = body_json(get(app.clone(), &uri).await).await;
    let listed: Vec<i64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(listed, ids[1..].to_vec());

    let json = body_json(get(app, &format!("{uri}?include_attached=true")).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn zoneless_run_lists_unzoned_only_on_request(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let response = post_json(
        app.clone(),
        "/api/v1/service-runs",
        serde_json::json!({ "name": "Portal only", "portal_id": PORTAL }),
    )
    .await;
    let run = body_json(response).await["data"]["id"].as_i64().unwrap();
    let unzoned = seed_request_in(&pool, "Unzoned", PORTAL, None).await.id;
    seed_request(&pool, "Zoned").await;

    let uri = format!("/api/v1/service-runs/{run}/eligible-requests");
    let json = body_json(get(app.clone(), &uri).await).await;
    assert!(json["data"].as_array().unwrap().is_empty());

    let json = body_json(get(app, &format!("{uri}?include_unzoned=true")).await).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], unzoned);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_without_portal_accepts_no_attachments(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let response = post_json(
        app.clone(),
        "/api/v1/service-runs",
        serde_json::json!({ "name": "Nowhere" }),
    )
    .await;
    let run = body_json(response).await["data"]["id"].as_i64().unwrap();
    let unzoned = seed_request_in(&pool, "Unzoned elsewhere", PORTAL + 98, None).await.id;

    let response = attach(app.clone(), run, &[unzoned]).await;
    assert_error(response, StatusCode::CONFLICT, "NOT_ELIGIBLE").await;

    let response = get(app, &format!("/api/v1/service-runs/{run}/attachments")).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_without_portal_has_no_candidates(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let response = post_json(
        app.clone(),
        "/api/v1/service-runs",
        serde_json::json!({ "name": "Nowhere" }),
    )
    .await;
    let run = body_json(response).await["data"]["id"].as_i64().unwrap();
    seed_requests(&pool, 2).await;

    let response = get(app, &format!("/api/v1/service-runs/{run}/eligible-requests")).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Drift
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn drift_is_skipped_without_attachments(pool: PgPool) {
    let app = build_test_app(pool);
    let run = create_run(app.clone(), "Nothing").await;

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/drift")).await).await;
    assert_eq!(json["data"]["evaluated"], false);
    assert!(json["data"]["skipped_reason"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn drift_counts_opt_out_and_zone_moves(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Drifting").await;
    let ids = seed_requests(&pool, 3).await;
    attach(app.clone(), run, &ids).await;

    MaintenanceRequestRepo::set_coordination_opt_in(&pool, ids[0], false, None)
        .await
        .unwrap();
    MaintenanceRequestRepo::set_zone(&pool, ids[1], Some(ZONE + 5))
        .await
        .unwrap();

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/drift")).await).await;
    let data = &json["data"];
    assert_eq!(data["evaluated"], true);
    assert_eq!(data["counts"]["coordination_opt_out"], 1);
    assert_eq!(data["counts"]["zone_mismatch"], 1);
    assert_eq!(data["counts"]["inactive_status"], 0);

    let items = data["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["request_id"], ids[0]);
    assert_eq!(items[0]["categories"], serde_json::json!(["coordination_opt_out"]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn clearing_the_location_flags_zoned_attachments(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let run = create_run(app.clone(), "Relocated").await;
    let ids = seed_requests(&pool, 2).await;
    assert_eq!(attach(app.clone(), run, &ids).await.status(), StatusCode::OK);

    let response = put_json(
        app.clone(),
        &format!("/api/v1/service-runs/{run}/location"),
        serde_json::json!({ "portal_id": null, "zone_id": null }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get(app, &format!("/api/v1/service-runs/{run}/drift")).await).await;
    assert_eq!(json["data"]["evaluated"], true);
    assert_eq!(json["data"]["counts"]["zone_mismatch"], 2);
}
