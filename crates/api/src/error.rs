use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use isp_core::error::CoreError;
use isp_core::hierarchy::{ImpactSummary, NodeRef, StoreError};
use isp_hierarchy::HierarchyError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`], [`StoreError`] and [`HierarchyError`] and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce consistent
/// `{ "error": ..., "code": ... }` JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// A non-cascading delete hit a node with descendants.
    #[error("{message}")]
    CascadeRequired {
        node: NodeRef,
        impact: ImpactSummary,
        message: String,
    },

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Store(store) => classify_store_error(store),

            AppError::Hierarchy(err) => match err {
                HierarchyError::Core(core) => classify_core_error(core),
                HierarchyError::Store(store) => classify_store_error(store),
                HierarchyError::ConcurrentDeleteConflict(_) => {
                    (StatusCode::CONFLICT, "DELETE_IN_PROGRESS", err.to_string())
                }
                HierarchyError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_STATE", err.to_string())
                }
                HierarchyError::DeleteFailed { source, .. } => {
                    let (status, code, _) = classify_store_error(source);
                    (status, code, err.to_string())
                }
            },

            AppError::CascadeRequired {
                node,
                impact,
                message,
            } => {
                let body = json!({
                    "error": message,
                    "code": "CASCADE_REQUIRED",
                    "node": node,
                    "impact": impact,
                });
                return (StatusCode::CONFLICT, axum::Json(body)).into_response();
            }

            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Store failures are shown to the operator verbatim.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err {
        StoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StoreError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "STORE_TIMEOUT"),
        StoreError::Backend(_) => (StatusCode::BAD_GATEWAY, "STORE_ERROR"),
    };
    (status, code, err.to_string())
}
