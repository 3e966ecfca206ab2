//! Location hierarchy orchestration.
//!
//! [`HierarchyService`] owns the current immutable snapshot of the location
//! hierarchy, rebuilds it from a [`RecordStore`](isp_core::hierarchy::RecordStore),
//! resolves the visible list for the active scope and search text, and hands
//! out [`DeletionAttempt`]s that walk the two-confirmation delete protocol.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod service;

pub use config::{CascadeMode, HierarchyConfig};
pub use coordinator::{DeletionAttempt, DeletionState};
pub use error::HierarchyError;
pub use memory::MemoryRecordStore;
pub use service::{FetchWarning, HierarchyService, HierarchySnapshot, ViewState};
