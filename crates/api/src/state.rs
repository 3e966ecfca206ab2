use std::sync::Arc;

use isp_core::hierarchy::RecordStore;
use isp_db::PgRecordStore;
use isp_hierarchy::HierarchyService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState<S>>`.
///
/// Generic over the record store so integration tests can run the real
/// router against an in-memory store.
pub struct AppState<S> {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Owner of the location hierarchy snapshot.
    pub hierarchy: Arc<HierarchyService<S>>,
}

/// State used by the production binary.
pub type PgAppState = AppState<PgRecordStore>;

impl<S: RecordStore + 'static> AppState<S> {
    pub fn new(config: Arc<ServerConfig>, hierarchy: Arc<HierarchyService<S>>) -> Self {
        Self { config, hierarchy }
    }
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            hierarchy: Arc::clone(&self.hierarchy),
        }
    }
}
