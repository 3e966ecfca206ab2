//! Route definitions for the location hierarchy.

use axum::routing::{get, post, put};
use axum::Router;
use isp_core::hierarchy::RecordStore;

use crate::handlers::locations;
use crate::state::AppState;

/// Location routes mounted at `/locations`.
///
/// ```text
/// GET    /tree                 -> get_tree
/// GET    /index                -> get_index
/// GET    /counts               -> get_counts
/// GET    /warnings             -> get_warnings
/// GET    /search               -> search
/// GET    /view                 -> get_view
/// PUT    /view                 -> set_view
/// POST   /refresh              -> refresh
/// POST   /{kind}               -> create_node
/// PUT    /{kind}/{id}          -> update_node
/// DELETE /{kind}/{id}          -> delete_node
/// GET    /{kind}/{id}/impact   -> get_impact
/// ```
pub fn router<S: RecordStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/tree", get(locations::get_tree::<S>))
        .route("/index", get(locations::get_index::<S>))
        .route("/counts", get(locations::get_counts::<S>))
        .route("/warnings", get(locations::get_warnings::<S>))
        .route("/search", get(locations::search::<S>))
        .route(
            "/view",
            get(locations::get_view::<S>).put(locations::set_view::<S>),
        )
        .route("/refresh", post(locations::refresh::<S>))
        .route("/{kind}", post(locations::create_node::<S>))
        .route(
            "/{kind}/{id}",
            put(locations::update_node::<S>).delete(locations::delete_node::<S>),
        )
        .route("/{kind}/{id}/impact", get(locations::get_impact::<S>))
}
