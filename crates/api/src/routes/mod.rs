pub mod health;
pub mod locations;

use axum::Router;
use isp_core::hierarchy::RecordStore;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /locations/tree                          nested region > city > barangay > location
/// /locations/index                         flat index with denormalized chain
/// /locations/counts                        descendant counts per node
/// /locations/warnings                      fetch warnings of the last rebuild
/// /locations/search                        scoped search (GET ?scope=&q=)
/// /locations/view                          screen view state (GET, PUT)
/// /locations/refresh                       force a rebuild (POST)
/// /locations/{kind}                        create (POST)
/// /locations/{kind}/{id}                   rename (PUT), delete (DELETE ?cascade=)
/// /locations/{kind}/{id}/impact            cascade impact preview
/// ```
pub fn api_routes<S: RecordStore + 'static>() -> Router<AppState<S>> {
    Router::new().nest("/locations", locations::router::<S>())
}
