//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no router needed.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use isp_api::error::AppError;
use isp_core::error::CoreError;
use isp_core::hierarchy::{ConflictInfo, ImpactSummary, LocationKind, NodeRef, StoreError};
use isp_hierarchy::HierarchyError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "City",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "City with id 42 not found");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("A city requires a parent region".into()));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "A city requires a parent region");
}

#[tokio::test]
async fn cascade_required_carries_impact() {
    let err = AppError::CascadeRequired {
        node: NodeRef::barangay(7),
        impact: ImpactSummary::from_counts(LocationKind::Barangay, 0, 0, 4),
        message: "Barangay \"Libid\" contains 4 locations.".into(),
    };
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CASCADE_REQUIRED");
    assert_eq!(json["impact"]["locations"], 4);
    assert_eq!(json["node"]["id"], 7);
}

#[tokio::test]
async fn store_conflict_returns_409_with_store_message() {
    let err = AppError::Store(StoreError::Conflict(ConflictInfo {
        node: NodeRef::city(3),
        impact: ImpactSummary::from_counts(LocationKind::City, 0, 1, 0),
    }));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "City #3 still contains 1 barangay");
}

#[tokio::test]
async fn store_timeout_returns_504() {
    let err = AppError::Hierarchy(HierarchyError::Store(StoreError::Timeout(
        Duration::from_secs(10),
    )));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["code"], "STORE_TIMEOUT");
}

#[tokio::test]
async fn concurrent_delete_returns_409() {
    let err = AppError::Hierarchy(HierarchyError::ConcurrentDeleteConflict(NodeRef::region(1)));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "DELETE_IN_PROGRESS");
    assert_eq!(json["error"], "A delete for Region #1 is already in progress");
}

#[tokio::test]
async fn delete_failure_keeps_store_text() {
    let err = AppError::Hierarchy(HierarchyError::DeleteFailed {
        node: NodeRef::location(9),
        source: StoreError::Backend("disk full".into()),
    });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "Failed to delete Location #9: Store error: disk full");
}

#[tokio::test]
async fn internal_error_is_sanitized() {
    let err = AppError::InternalError("pool poisoned".into());
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}
