//! Handlers for the location hierarchy.
//!
//! Reads are served from the current snapshot and never touch the store.
//! Deletes drive one [`DeletionAttempt`] per request: `cascade=true` with
//! the `expected` descendant total is the operator's answer to the second
//! confirmation, so a request without it stops at the cascade prompt and
//! returns 409 with the impact summary.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use isp_core::error::CoreError;
use isp_core::hierarchy::filter::resolve;
use isp_core::hierarchy::impact::{analyze, cascade_prompt};
use isp_core::hierarchy::{
    ImpactSummary, LocationItem, LocationKind, NodeInput, NodeRef, RecordStore, ScopeFilter,
};
use isp_core::types::DbId;
use isp_hierarchy::{DeletionAttempt, DeletionState, FetchWarning, ViewState};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /locations/search` and the body of `PUT /locations/view`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// `all`, `region:ID`, `city:ID` or `barangay:ID`.
    pub scope: Option<String>,
    #[serde(default, alias = "search")]
    pub q: String,
}

impl SearchParams {
    fn scope(&self) -> AppResult<ScopeFilter> {
        match self.scope.as_deref() {
            None => Ok(ScopeFilter::All),
            Some(raw) => Ok(raw.parse()?),
        }
    }
}

/// Query parameters for `DELETE /locations/{kind}/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub cascade: bool,
    /// Total descendant count from the impact the caller was shown.
    pub expected: Option<usize>,
}

/// A node as written, plus its indexed view when the rebuild after the
/// write produced one.
#[derive(Debug, Serialize)]
pub struct NodeResponse {
    pub id: DbId,
    pub kind: LocationKind,
    pub name: String,
    pub parent_id: Option<DbId>,
    pub indexed: Option<LocationItem>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view: ViewState,
    pub items: Vec<LocationItem>,
}

#[derive(Debug, Serialize)]
pub struct ImpactResponse {
    pub node: NodeRef,
    pub impact: ImpactSummary,
    /// Confirmation wording shown before a cascading delete.
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub generation: u64,
    pub items: usize,
    pub warnings: Vec<FetchWarning>,
}

fn node_ref(kind: &str, id: DbId) -> AppResult<NodeRef> {
    let kind: LocationKind = kind.parse()?;
    Ok(NodeRef::new(kind, id))
}

// ---------------------------------------------------------------------------
// Snapshot reads
// ---------------------------------------------------------------------------

/// GET /api/v1/locations/tree
pub async fn get_tree<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
) -> AppResult<impl IntoResponse> {
    let tree = state.hierarchy.tree().await;
    Ok(Json(DataResponse { data: tree }))
}

/// GET /api/v1/locations/index
pub async fn get_index<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
) -> AppResult<impl IntoResponse> {
    let index = state.hierarchy.index().await;
    Ok(Json(DataResponse { data: index }))
}

/// GET /api/v1/locations/counts
pub async fn get_counts<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
) -> AppResult<impl IntoResponse> {
    let counts = state.hierarchy.counts().await;
    Ok(Json(DataResponse { data: counts }))
}

/// GET /api/v1/locations/warnings
///
/// Collections that failed to load in the last rebuild and were shown as empty.
pub async fn get_warnings<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.hierarchy.snapshot().await;
    Ok(Json(DataResponse {
        data: snapshot.warnings.clone(),
    }))
}

/// GET /api/v1/locations/search?scope=city:10&q=tower
///
/// Stateless scoped search; does not change the screen's view state.
pub async fn search<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let scope = params.scope()?;
    let snapshot = state.hierarchy.snapshot().await;
    let items: Vec<LocationItem> = resolve(snapshot.index(), scope, &params.q)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(DataResponse { data: items }))
}

/// GET /api/v1/locations/{kind}/{id}/impact
///
/// What a cascading delete of the node would remove, with the prompt text.
pub async fn get_impact<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path((kind, id)): Path<(String, DbId)>,
) -> AppResult<impl IntoResponse> {
    let node = node_ref(&kind, id)?;
    let snapshot = state.hierarchy.snapshot().await;
    let (Some(impact), Some(item)) = (analyze(node, snapshot.index()), snapshot.index().get(node))
    else {
        return Err(AppError::Core(CoreError::NotFound {
            entity: node.kind.label(),
            id,
        }));
    };

    let message = cascade_prompt(&item.name, &impact);
    Ok(Json(DataResponse {
        data: ImpactResponse {
            node,
            impact,
            message,
        },
    }))
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

/// GET /api/v1/locations/view
pub async fn get_view<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
) -> AppResult<impl IntoResponse> {
    let view = state.hierarchy.view().await;
    let items = state.hierarchy.visible_items().await;
    Ok(Json(DataResponse {
        data: ViewResponse { view, items },
    }))
}

/// PUT /api/v1/locations/view
///
/// Replace the scope filter and search text, returning the visible list.
pub async fn set_view<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
    Json(input): Json<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let scope = input.scope()?;
    state.hierarchy.set_scope_filter(scope).await;
    state.hierarchy.set_search_text(input.q).await;

    let view = state.hierarchy.view().await;
    let items = state.hierarchy.visible_items().await;
    Ok(Json(DataResponse {
        data: ViewResponse { view, items },
    }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// POST /api/v1/locations/refresh
pub async fn refresh<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
) -> AppResult<impl IntoResponse> {
    // A superseded rebuild still leaves a newer snapshot in place.
    let snapshot = match state.hierarchy.rebuild().await {
        Some(snapshot) => snapshot,
        None => state.hierarchy.snapshot().await,
    };
    Ok(Json(DataResponse {
        data: RefreshResponse {
            generation: snapshot.generation,
            items: snapshot.index().len(),
            warnings: snapshot.warnings.clone(),
        },
    }))
}

/// POST /api/v1/locations/{kind}
pub async fn create_node<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path(kind): Path<String>,
    Json(input): Json<NodeInput>,
) -> AppResult<impl IntoResponse> {
    let kind: LocationKind = kind.parse()?;
    let input = input.normalize(kind)?;
    let node = state.hierarchy.create_node(kind, input.clone()).await?;
    let response = written_node(&state, node, input).await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// PUT /api/v1/locations/{kind}/{id}
pub async fn update_node<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path((kind, id)): Path<(String, DbId)>,
    Json(input): Json<NodeInput>,
) -> AppResult<impl IntoResponse> {
    let node = node_ref(&kind, id)?;
    let input = input.normalize(node.kind)?;
    state.hierarchy.update_node(node, input.clone()).await?;
    let response = written_node(&state, node, input).await;
    Ok(Json(DataResponse { data: response }))
}

/// DELETE /api/v1/locations/{kind}/{id}?cascade=true&expected=N
///
/// Returns 204 once the node is gone (including when it already was). A
/// node with descendants is only removed when `cascade=true` and `expected`
/// equals the total of the current impact summary; otherwise the response
/// is 409 with the summary to confirm.
pub async fn delete_node<S: RecordStore + 'static>(
    State(state): State<AppState<S>>,
    Path((kind, id)): Path<(String, DbId)>,
    Query(params): Query<DeleteParams>,
) -> AppResult<StatusCode> {
    let node = node_ref(&kind, id)?;
    let mut attempt = state.hierarchy.request_delete(node)?;

    if attempt.confirm().await? == DeletionState::ConfirmCascade {
        let confirmed =
            params.cascade && params.expected == attempt.impact().map(ImpactSummary::total);
        if !confirmed || attempt.confirm().await? == DeletionState::ConfirmCascade {
            return Err(cascade_required(&mut attempt).await);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Decline the pending cascade and describe it to the caller.
async fn cascade_required<S: RecordStore + 'static>(attempt: &mut DeletionAttempt<S>) -> AppError {
    let node = attempt.node();
    let impact = attempt
        .impact()
        .copied()
        .unwrap_or_else(|| ImpactSummary::empty(node.kind));
    let message = attempt.prompt().await.unwrap_or_else(|| node.to_string());
    if let Err(err) = attempt.decline() {
        return err.into();
    }
    AppError::CascadeRequired {
        node,
        impact,
        message,
    }
}

/// The write already succeeded, so a node missing from a superseded or
/// degraded rebuild is reported without its indexed view.
async fn written_node<S: RecordStore + 'static>(
    state: &AppState<S>,
    node: NodeRef,
    input: NodeInput,
) -> NodeResponse {
    let indexed = state.hierarchy.snapshot().await.index().get(node).cloned();
    if indexed.is_none() {
        tracing::warn!(node = %node, "Written node missing from current snapshot");
    }
    NodeResponse {
        id: node.id,
        kind: node.kind,
        name: input.name,
        parent_id: input.parent_id,
        indexed,
    }
}
