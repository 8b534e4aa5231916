#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use n3_api::config::ServerConfig;
use n3_api::routes;
use n3_api::state::AppState;
use n3_api::ws::WsManager;
use n3_core::policy::CoordinationPolicy;
use n3_core::types::DbId;
use n3_db::models::maintenance_request::{CreateMaintenanceRequest, MaintenanceRequest};
use n3_db::repositories::MaintenanceRequestRepo;
use n3_events::EventBus;

/// Test `ServerConfig` with the dev CORS origin and a 30-second timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

pub fn test_state(pool: PgPool, policy: CoordinationPolicy) -> AppState {
    AppState {
        pool,
        config: Arc::new(test_config()),
        policy: Arc::new(policy),
        ws_manager: Arc::new(WsManager::new()),
        event_bus: Arc::new(EventBus::default()),
    }
}

/// Full router with the same middleware stack as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_with_state(test_state(pool, CoordinationPolicy::default()))
}

pub fn build_app_with_state(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    send(app, Method::POST, uri, None).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and the error `code` of an error response.
pub async fn assert_error(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected error body: {json}");
}

// ---------------------------------------------------------------------------
// Seed helpers
// ---------------------------------------------------------------------------

pub const PORTAL: DbId = 1;
pub const ZONE: DbId = 10;

/// Create a draft run in `PORTAL`/`ZONE` and return its id.
pub async fn create_run(app: Router, name: &str) -> DbId {
    let response = post_json(
        app,
        "/api/v1/service-runs",
        serde_json::json!({
            "name": name,
            "portal_id": PORTAL,
            "zone_id": ZONE,
            "starts_at": "2026-11-02T08:00:00Z",
            "ends_at": "2026-11-02T16:00:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// Opted-in, open request in `PORTAL`/`ZONE`.
pub async fn seed_request(pool: &PgPool, title: &str) -> MaintenanceRequest {
    seed_request_in(pool, title, PORTAL, Some(ZONE)).await
}

pub async fn seed_request_in(
    pool: &PgPool,
    title: &str,
    portal_id: DbId,
    zone_id: Option<DbId>,
) -> MaintenanceRequest {
    MaintenanceRequestRepo::create(
        pool,
        &CreateMaintenanceRequest {
            portal_id,
            zone_id,
            title: title.to_string(),
            category: "plumbing".to_string(),
            status: None,
            coordination_opt_in: true,
            coordination_opt_in_at: Some(chrono::Utc::now()),
        },
    )
    .await
    .unwrap()
}

pub async fn seed_requests(pool: &PgPool, count: usize) -> Vec<DbId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        ids.push(seed_request(pool, &format!("Request {i}")).await.id);
    }
    ids
}

pub async fn attach(app: Router, run_id: DbId, ids: &[DbId]) -> Response {
    post_json(
        app,
        &format!("/api/v1/service-runs/{run_id}/attachments"),
        serde_json::json!({ "request_ids": ids }),
    )
    .await
}
