//! Record store contract.
//!
//! The hierarchy engine only needs four list reads and per-node writes from
//! its data source. [`RecordStore`] captures exactly that, so the engine can
//! run against PostgreSQL, a remote API, or an in-memory fixture alike.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hierarchy::impact::ImpactSummary;
use crate::hierarchy::model::{Barangay, City, Location, LocationKind, NodeInput, NodeRef, Region};
use crate::types::DbId;

/// The store's own view of what blocks a non-cascading delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub node: NodeRef,
    pub impact: ImpactSummary,
}

/// Errors reported by a [`RecordStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A non-cascading delete hit a node that still has children.
    #[error("{} still contains {}", .0.node, .0.impact.describe())]
    Conflict(ConflictInfo),

    /// The addressed node does not exist.
    #[error("{0} not found")]
    NotFound(NodeRef),

    /// The request did not complete within the configured bound.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport or backend failure, carried verbatim.
    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: impl fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Data source for the location hierarchy.
pub trait RecordStore: Send + Sync {
    fn list_regions(&self) -> impl Future<Output = Result<Vec<Region>, StoreError>> + Send;

    fn list_cities(&self) -> impl Future<Output = Result<Vec<City>, StoreError>> + Send;

    fn list_barangays(&self) -> impl Future<Output = Result<Vec<Barangay>, StoreError>> + Send;

    fn list_locations(&self) -> impl Future<Output = Result<Vec<Location>, StoreError>> + Send;

    /// Delete one node.
    ///
    /// Without `cascade`, a node that still has children must be rejected
    /// with [`StoreError::Conflict`]. With `cascade`, the node and its whole
    /// subtree are removed as one unit.
    fn delete(
        &self,
        node: NodeRef,
        cascade: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Create a node and return its id. `input` is already normalized.
    fn create(
        &self,
        kind: LocationKind,
        input: NodeInput,
    ) -> impl Future<Output = Result<DbId, StoreError>> + Send;

    /// Rename and/or re-parent an existing node. `input` is already normalized.
    fn update(
        &self,
        node: NodeRef,
        input: NodeInput,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
