#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use isp_api::config::ServerConfig;
use isp_api::router::build_app_router;
use isp_api::state::AppState;
use isp_hierarchy::{CascadeMode, HierarchyConfig, HierarchyService, MemoryRecordStore};
use tower::ServiceExt;

pub type TestService = Arc<HierarchyService<MemoryRecordStore>>;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Region "Rizal" with city "Binangonan", barangays "Libid" and "Pantok",
/// and three locations in each barangay.
pub fn seeded_store() -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    store.insert_region(1, "Rizal");
    store.insert_city(10, "Binangonan", 1);
    store.insert_barangay(100, "Libid", 10);
    store.insert_barangay(101, "Pantok", 10);
    store.insert_location(1000, "Libid Tower", 100);
    store.insert_location(1001, "Libid Hub", 100);
    store.insert_location(1002, "Libid Cabinet", 100);
    store.insert_location(1003, "Pantok Tower", 101);
    store.insert_location(1004, "Pantok Hub", 101);
    store.insert_location(1005, "Pantok Cabinet", 101);
    store
}

/// Build the full application router over `store` after an initial rebuild.
///
/// Returns the service as well so tests can inspect the store and snapshot.
pub async fn build_test_app_with(
    store: MemoryRecordStore,
    cascade_mode: CascadeMode,
) -> (Router, TestService) {
    let config = test_config();
    let hierarchy_config = HierarchyConfig {
        cascade_mode,
        ..HierarchyConfig::default()
    };
    let service = Arc::new(HierarchyService::new(Arc::new(store), hierarchy_config));
    service.rebuild().await;

    let state = AppState::new(Arc::new(config.clone()), Arc::clone(&service));
    (build_app_router(state, &config), service)
}

pub async fn build_test_app() -> (Router, TestService) {
    build_test_app_with(seeded_store(), CascadeMode::Server).await
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
