//! Location hierarchy: Region → City → Barangay → Location.
//!
//! - [`model`]: entities, [`LocationKind`], [`NodeRef`], [`NodeInput`].
//! - [`index`]: the pure tree/index builder and descendant counts.
//! - [`impact`]: cascade impact analysis and confirmation wording.
//! - [`cascade`]: bottom-up deletion plans for client-driven cascades.
//! - [`filter`]: scope filter and free-text search.
//! - [`store`]: the [`RecordStore`] contract the engine reads from.

pub mod cascade;
pub mod filter;
pub mod impact;
pub mod index;
pub mod model;
pub mod store;

pub use cascade::CascadePlan;
pub use filter::ScopeFilter;
pub use impact::ImpactSummary;
pub use index::{build, DescendantCounts, Hierarchy, HierarchyIndex, HierarchyTree, LocationItem};
pub use model::{Barangay, City, Location, LocationKind, NodeInput, NodeRef, Region};
pub use store::{ConflictInfo, RecordStore, StoreError};
