//! Bottom-up deletion plan for client-driven cascades.
//!
//! When the store cannot remove a subtree transactionally, the subtree has to
//! be deleted node by node. The plan orders those deletes so that a node is
//! never removed while any of its currently-known children still exist:
//! locations first, then barangays, then cities, then the target itself.

use std::cmp::Reverse;

use serde::Serialize;

use crate::hierarchy::index::HierarchyIndex;
use crate::hierarchy::model::NodeRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadePlan {
    pub target: NodeRef,
    /// Deletes to issue, in order. The target is always last.
    pub steps: Vec<NodeRef>,
}

impl CascadePlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Plan the deletion of `target` and everything the index knows below it.
///
/// A target missing from the index yields a single-step plan; the store is
/// the authority on whether it still exists.
pub fn plan(target: NodeRef, index: &HierarchyIndex) -> CascadePlan {
    let mut steps: Vec<NodeRef> = index.descendants(target).map(|item| item.node()).collect();
    // Stable: index order is kept within a kind.
    steps.sort_by_key(|node| Reverse(node.kind));
    steps.push(target);
    CascadePlan { target, steps }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
