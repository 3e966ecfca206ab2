//! HTTP-level integration tests for the `/locations` API endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router,
//! backed by an in-memory record store.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, build_test_app_with, delete, get, post_json, put_json,
    seeded_store,
};
use isp_core::hierarchy::{LocationKind, NodeRef};
use isp_hierarchy::CascadeMode;
use serde_json::json;

// ---------------------------------------------------------------------------
// Snapshot reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tree_nests_every_level() {
    let (app, _) = build_test_app().await;
    let response = get(app, "/api/v1/locations/tree").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let region = &json["data"]["regions"][0];
    assert_eq!(region["name"], "Rizal");
    let city = &region["cities"][0];
    assert_eq!(city["name"], "Binangonan");
    assert_eq!(city["barangays"].as_array().unwrap().len(), 2);
    assert_eq!(city["barangays"][0]["locations"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn index_carries_chain_and_counts() {
    let (app, _) = build_test_app().await;
    let json = body_json(get(app, "/api/v1/locations/index").await).await;

    let items = json["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    let tower = items.iter().find(|i| i["name"] == "Pantok Tower").unwrap();
    assert_eq!(tower["kind"], "location");
    assert_eq!(tower["parent_name"], "Pantok");
    assert_eq!(tower["barangay_id"], 101);
    assert_eq!(tower["city_id"], 10);
    assert_eq!(tower["region_id"], 1);

    assert_eq!(json["data"]["counts"]["by_region"]["1"], 9);
    assert_eq!(json["data"]["counts"]["by_barangay"]["100"], 3);
}

#[tokio::test]
async fn counts_endpoint_matches_index_counts() {
    let (app, _) = build_test_app().await;
    let json = body_json(get(app, "/api/v1/locations/counts").await).await;
    assert_eq!(json["data"]["by_city"]["10"], 8);
}

// ---------------------------------------------------------------------------
// Search and view state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_combines_scope_and_text() {
    let (app, _) = build_test_app().await;
    let json = body_json(get(app, "/api/v1/locations/search?scope=barangay:101&q=hub").await).await;

    let items = json["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Pantok Hub");
}

#[tokio::test]
async fn search_with_empty_query_pins_scoped_node_first() {
    let (app, _) = build_test_app().await;
    let json = body_json(get(app, "/api/v1/locations/search?scope=city:10").await).await;

    let items = json["data"].as_array().unwrap();
    assert_eq!(items.len(), 9);
    assert_eq!(items[0]["kind"], "city");
    assert_eq!(items[0]["id"], 10);
}

#[tokio::test]
async fn search_with_bad_scope_is_rejected() {
    let (app, _) = build_test_app().await;
    let response = get(app, "/api/v1/locations/search?scope=province:1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn view_state_round_trips() {
    let (app, _) = build_test_app().await;
    let response = put_json(
        app.clone(),
        "/api/v1/locations/view",
        json!({ "scope": "barangay:100", "q": "tower" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["view"]["scope"], "barangay:100");
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 1);

    let json = body_json(get(app, "/api/v1/locations/view").await).await;
    assert_eq!(json["data"]["view"]["search"], "tower");
    assert_eq!(json["data"]["items"][0]["name"], "Libid Tower");
}

// ---------------------------------------------------------------------------
// Impact preview
// ---------------------------------------------------------------------------

#[tokio::test]
async fn impact_lists_descendants_and_prompt() {
    let (app, _) = build_test_app().await;
    let response = get(app, "/api/v1/locations/city/10/impact").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["impact"]["barangays"], 2);
    assert_eq!(json["data"]["impact"]["locations"], 6);
    assert!(json["data"]["impact"].get("cities").is_none());
    let message = json["data"]["message"].as_str().unwrap();
    assert!(message.starts_with("City \"Binangonan\" contains 2 barangays and 6 locations."));
}

#[tokio::test]
async fn impact_of_unknown_node_is_404() {
    let (app, _) = build_test_app().await;
    let response = get(app, "/api/v1/locations/region/77/impact").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Deletes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leaf_delete_returns_no_content() {
    let (app, service) = build_test_app().await;
    let response = delete(app, "/api/v1/locations/location/1000").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let snapshot = service.snapshot().await;
    assert!(!snapshot.index().contains(NodeRef::location(1000)));
    assert_eq!(snapshot.counts().get(NodeRef::barangay(100)), 2);
}

#[tokio::test]
async fn delete_without_cascade_reports_impact() {
    let (app, service) = build_test_app().await;
    let response = delete(app.clone(), "/api/v1/locations/barangay/100").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["code"], "CASCADE_REQUIRED");
    assert_eq!(json["impact"]["locations"], 3);
    assert_eq!(json["node"]["kind"], "barangay");
    assert!(json["error"].as_str().unwrap().contains("3 locations"));

    assert!(service.store().delete_calls().is_empty());
    assert!(service.deletions_in_flight().is_empty());
    assert!(service.snapshot().await.index().contains(NodeRef::barangay(100)));

    // The operator confirms the cascade.
    let response = delete(app, "/api/v1/locations/barangay/100?cascade=true&expected=3").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let snapshot = service.snapshot().await;
    assert!(!snapshot.index().contains(NodeRef::barangay(100)));
    assert_eq!(snapshot.counts().get(NodeRef::region(1)), 5);
}

#[tokio::test]
async fn cascade_with_stale_or_missing_total_is_not_executed() {
    let (app, service) = build_test_app().await;

    for uri in [
        "/api/v1/locations/city/10?cascade=true",
        "/api/v1/locations/city/10?cascade=true&expected=6",
    ] {
        let response = delete(app.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["code"], "CASCADE_REQUIRED");
        assert_eq!(json["impact"]["barangays"], 2);
        assert_eq!(json["impact"]["locations"], 6);
    }

    assert!(service.store().delete_calls().is_empty());
    assert!(service.deletions_in_flight().is_empty());
    assert!(service.snapshot().await.index().contains(NodeRef::city(10)));
}

#[tokio::test]
async fn delete_of_absent_node_is_idempotent() {
    let (app, _) = build_test_app().await;
    let response = delete(app, "/api/v1/locations/location/4242").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn delete_with_unknown_kind_is_bad_request() {
    let (app, _) = build_test_app().await;
    let response = delete(app, "/api/v1/locations/province/1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn client_cascade_deletes_bottom_up() {
    let (app, service) = build_test_app_with(seeded_store(), CascadeMode::Client).await;
    let response = delete(app, "/api/v1/locations/city/10?cascade=true&expected=8").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let calls = service.store().delete_calls();
    assert_eq!(calls.len(), 9);
    assert!(calls.iter().all(|c| !c.cascade));
    let position = |node: NodeRef| calls.iter().position(|c| c.node == node).unwrap();
    assert!(position(NodeRef::location(1000)) < position(NodeRef::barangay(100)));
    assert!(position(NodeRef::barangay(101)) < position(NodeRef::city(10)));
    assert_eq!(calls.last().unwrap().node, NodeRef::city(10));
}

#[tokio::test]
async fn failed_cascade_surfaces_store_message() {
    let (app, service) = build_test_app().await;
    service.store().fail_deletes("permission denied for table cities");

    let response = delete(app, "/api/v1/locations/city/10?cascade=true&expected=8").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "STORE_ERROR");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("permission denied for table cities"));
    assert!(service.snapshot().await.index().contains(NodeRef::city(10)));
}

// ---------------------------------------------------------------------------
// Create / update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_location_under_barangay() {
    let (app, service) = build_test_app().await;
    let response = post_json(
        app,
        "/api/v1/locations/locations",
        json!({ "name": "  Libid Annex ", "parent_id": 100 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "Libid Annex");
    assert_eq!(json["data"]["kind"], "location");
    assert_eq!(json["data"]["indexed"]["parent_name"], "Libid");
    assert_eq!(service.counts().await.get(NodeRef::barangay(100)), 4);
}

#[tokio::test]
async fn create_succeeds_while_its_kind_fails_to_load() {
    let (app, service) = build_test_app().await;
    service.store().fail_list(LocationKind::Location, "connection reset");

    let response = post_json(
        app,
        "/api/v1/locations/location",
        json!({ "name": "Annex", "parent_id": 100 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "Annex");
    assert_eq!(json["data"]["parent_id"], 100);
    assert!(json["data"]["id"].is_i64());
    assert!(json["data"]["indexed"].is_null());

    // The write landed; the next healthy rebuild shows it.
    service.store().clear_faults();
    service.rebuild().await;
    assert_eq!(service.counts().await.get(NodeRef::barangay(100)), 4);
}

#[tokio::test]
async fn create_with_missing_parent_is_rejected() {
    let (app, _) = build_test_app().await;
    let response = post_json(
        app,
        "/api/v1/locations/barangay",
        json!({ "name": "Tayuman", "parent_id": 999 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn create_with_blank_name_is_rejected() {
    let (app, _) = build_test_app().await;
    let response = post_json(app, "/api/v1/locations/region", json!({ "name": "   " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rename_updates_children_parent_name() {
    let (app, service) = build_test_app().await;
    let response = put_json(
        app,
        "/api/v1/locations/barangay/101",
        json!({ "name": "Pantok East", "parent_id": 10 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = service.snapshot().await;
    let hub = snapshot.index().get(NodeRef::location(1004)).unwrap();
    assert_eq!(hub.parent_name.as_deref(), Some("Pantok East"));
}

// ---------------------------------------------------------------------------
// Refresh, warnings, health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_picks_up_external_writes() {
    let (app, service) = build_test_app().await;
    service.store().insert_location(2000, "Libid Pole", 100);

    let response = post_json(app, "/api/v1/locations/refresh", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["items"], 11);
    assert_eq!(json["data"]["generation"], 2);
}

#[tokio::test]
async fn degraded_rebuild_is_reported() {
    let (app, service) = build_test_app().await;
    service.store().fail_list(LocationKind::Barangay, "connection reset");
    service.rebuild().await;

    let json = body_json(get(app.clone(), "/api/v1/locations/warnings").await).await;
    assert_eq!(json["data"][0]["kind"], "barangay");
    assert_eq!(json["data"][0]["message"], "Store error: connection reset");

    let json = body_json(get(app, "/health").await).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["warnings"], 1);
}

#[tokio::test]
async fn health_reports_ok_and_request_id() {
    let (app, _) = build_test_app().await;
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["generation"], 1);
    assert_eq!(json["cascade_mode"], "server");
    assert!(json["version"].is_string());
}
