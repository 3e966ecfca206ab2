use isp_core::error::CoreError;
use isp_core::hierarchy::{NodeRef, StoreError};

use crate::coordinator::DeletionState;

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A second delete for a node whose deletion is still in progress.
    #[error("A delete for {0} is already in progress")]
    ConcurrentDeleteConflict(NodeRef),

    /// The action is not valid in the attempt's current state.
    #[error("Cannot {action} deletion of {node} in state {state:?}")]
    InvalidTransition {
        node: NodeRef,
        state: DeletionState,
        action: &'static str,
    },

    /// The store rejected or failed a delete. Carries the store error verbatim.
    #[error("Failed to delete {node}: {source}")]
    DeleteFailed {
        node: NodeRef,
        #[source]
        source: StoreError,
    },
}
