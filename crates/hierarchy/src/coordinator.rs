//! Two-confirmation deletion protocol.
//!
//! A [`DeletionAttempt`] walks one node through:
//!
//! ```text
//! Idle -> ConfirmBasic -> NonCascadingDeleteSent -> Done
//!                                                -> CascadeRequired -> ConfirmCascade
//!                                                   -> CascadingDeleteSent -> Done | Failed
//! ```
//!
//! Declining at either prompt returns to `Idle` without touching the store.
//! Every terminal transition rebuilds the hierarchy from the store rather
//! than guessing what the store did. While an attempt is open its node is
//! registered in an [`InFlightRegistry`], so a second attempt for the same
//! node is refused until the first one finishes or is dropped.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use isp_core::hierarchy::cascade::plan;
use isp_core::hierarchy::impact::{analyze, basic_prompt, cascade_prompt};
use isp_core::hierarchy::{ImpactSummary, NodeRef, RecordStore, StoreError};
use isp_events::{event_types, ConsoleEvent};
use serde::Serialize;

use crate::config::CascadeMode;
use crate::error::HierarchyError;
use crate::service::{lock, HierarchyService, HierarchySnapshot};

// ---------------------------------------------------------------------------
// In-flight registry
// ---------------------------------------------------------------------------

/// Set of nodes with an open deletion attempt.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlightRegistry {
    nodes: Arc<Mutex<HashSet<NodeRef>>>,
}

impl InFlightRegistry {
    /// Register `node`, or `None` if it is already registered.
    pub(crate) fn try_acquire(&self, node: NodeRef) -> Option<InFlightGuard> {
        lock(&self.nodes).insert(node).then(|| InFlightGuard {
            nodes: Arc::clone(&self.nodes),
            node,
        })
    }

    pub(crate) fn snapshot(&self) -> HashSet<NodeRef> {
        lock(&self.nodes).clone()
    }
}

/// Releases its node from the registry on drop.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    nodes: Arc<Mutex<HashSet<NodeRef>>>,
    node: NodeRef,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.nodes).remove(&self.node);
    }
}

// ---------------------------------------------------------------------------
// DeletionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionState {
    Idle,
    ConfirmBasic,
    NonCascadingDeleteSent,
    CascadeRequired,
    ConfirmCascade,
    CascadingDeleteSent,
    Done,
    Failed,
}

impl DeletionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeletionState::Idle | DeletionState::Done | DeletionState::Failed
        )
    }
}

// ---------------------------------------------------------------------------
// DeletionAttempt
// ---------------------------------------------------------------------------

/// One run of the deletion protocol for a single node.
///
/// Created by [`HierarchyService::request_delete`] in
/// [`DeletionState::ConfirmBasic`]. The impact summary shown at the cascade
/// prompt is captured once and kept, so rebuilds triggered by other
/// deletions never change what this operator was asked to confirm. A
/// client-side cascade re-reads the store before planning; if the subtree
/// no longer matches the captured summary the attempt returns to
/// `ConfirmCascade` with the new one instead of deleting.
pub struct DeletionAttempt<S: RecordStore + 'static> {
    service: Arc<HierarchyService<S>>,
    node: NodeRef,
    state: DeletionState,
    impact: Option<ImpactSummary>,
    error: Option<StoreError>,
    guard: Option<InFlightGuard>,
}

impl<S: RecordStore + 'static> fmt::Debug for DeletionAttempt<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeletionAttempt")
            .field("node", &self.node)
            .field("state", &self.state)
            .field("impact", &self.impact)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<S: RecordStore + 'static> DeletionAttempt<S> {
    pub(crate) fn new(service: Arc<HierarchyService<S>>, node: NodeRef, guard: InFlightGuard) -> Self {
        Self {
            service,
            node,
            state: DeletionState::ConfirmBasic,
            impact: None,
            error: None,
            guard: Some(guard),
        }
    }

    pub fn node(&self) -> NodeRef {
        self.node
    }

    pub fn state(&self) -> DeletionState {
        self.state
    }

    /// Impact captured when the cascade became necessary.
    pub fn impact(&self) -> Option<&ImpactSummary> {
        self.impact.as_ref()
    }

    /// The store error that moved the attempt to `Failed`.
    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    /// Text of the confirmation the operator must answer, if any.
    pub async fn prompt(&self) -> Option<String> {
        let name = self.display_name().await;
        match self.state {
            DeletionState::ConfirmBasic => Some(basic_prompt(self.node.kind, &name)),
            DeletionState::ConfirmCascade => self
                .impact
                .as_ref()
                .map(|impact| cascade_prompt(&name, impact)),
            _ => None,
        }
    }

    /// Answer "yes" to the current prompt.
    ///
    /// At `ConfirmBasic` this sends the non-cascading delete and ends in
    /// `Done` or `ConfirmCascade`. At `ConfirmCascade` it sends the forced
    /// cascade and ends in `Done` or `Failed`. A store failure is returned
    /// as [`HierarchyError::DeleteFailed`] after the attempt moved to `Failed`.
    pub async fn confirm(&mut self) -> Result<DeletionState, HierarchyError> {
        match self.state {
            DeletionState::ConfirmBasic => self.send_non_cascading().await,
            DeletionState::ConfirmCascade => self.send_cascading().await,
            state => Err(self.invalid(state, "confirm")),
        }
    }

    /// Answer "no" to the current prompt. Nothing is sent to the store.
    pub fn decline(&mut self) -> Result<DeletionState, HierarchyError> {
        match self.state {
            DeletionState::ConfirmBasic | DeletionState::ConfirmCascade => {
                tracing::debug!(node = %self.node, "Deletion declined");
                self.state = DeletionState::Idle;
                self.guard.take();
                Ok(self.state)
            }
            state => Err(self.invalid(state, "decline")),
        }
    }

    // -- Transitions ---------------------------------------------------------

    async fn send_non_cascading(&mut self) -> Result<DeletionState, HierarchyError> {
        self.state = DeletionState::NonCascadingDeleteSent;

        // A locally known subtree is a conflict without asking the store.
        let snapshot = self.service.snapshot().await;
        let local = analyze(self.node, snapshot.index());
        if let Some(impact) = local.filter(|impact| !impact.is_empty()) {
            tracing::info!(node = %self.node, impact = %impact.describe(), "Delete needs cascade");
            return Ok(self.require_cascade(impact));
        }

        let result = self
            .service
            .bounded(self.service.store.delete(self.node, false))
            .await;

        match result {
            Ok(()) => self.finish_done(false).await,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(node = %self.node, "Node already absent");
                self.finish_done(false).await
            }
            Err(StoreError::Conflict(info)) => {
                tracing::info!(
                    node = %self.node,
                    impact = %info.impact.describe(),
                    "Store reported conflict, local data was stale"
                );
                Ok(self.require_cascade(info.impact))
            }
            Err(err) => self.finish_failed(err).await,
        }
    }

    fn require_cascade(&mut self, impact: ImpactSummary) -> DeletionState {
        self.state = DeletionState::CascadeRequired;
        self.impact = Some(impact);
        self.state = DeletionState::ConfirmCascade;
        self.state
    }

    async fn send_cascading(&mut self) -> Result<DeletionState, HierarchyError> {
        self.state = DeletionState::CascadingDeleteSent;

        let result = match self.service.config.cascade_mode {
            CascadeMode::Server => {
                self.service
                    .bounded(self.service.store.delete(self.node, true))
                    .await
            }
            CascadeMode::Client => {
                // The plan must cover what the store holds now, not what the
                // snapshot showed when the operator was prompted.
                let snapshot = match self.service.rebuild().await {
                    Some(snapshot) => snapshot,
                    None => self.service.snapshot().await,
                };
                let fresh = analyze(self.node, snapshot.index());
                if let Some(fresh) = fresh.filter(|fresh| Some(fresh) != self.impact.as_ref()) {
                    tracing::info!(
                        node = %self.node,
                        impact = %fresh.describe(),
                        "Subtree changed since the cascade prompt, asking again"
                    );
                    return Ok(self.require_cascade(fresh));
                }
                self.delete_bottom_up(&snapshot).await
            }
        };

        match result {
            Ok(()) | Err(StoreError::NotFound(_)) => self.finish_done(true).await,
            Err(err) => self.finish_failed(err).await,
        }
    }

    /// Delete the known subtree node by node, children before parents.
    ///
    /// Stops at the first failure; the rebuild that follows shows what
    /// actually remains.
    async fn delete_bottom_up(&self, snapshot: &HierarchySnapshot) -> Result<(), StoreError> {
        let plan = plan(self.node, snapshot.index());
        tracing::debug!(node = %self.node, steps = plan.len(), "Executing client-side cascade");

        for step in plan.steps {
            match self.service.bounded(self.service.store.delete(step, false)).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn finish_done(&mut self, cascade: bool) -> Result<DeletionState, HierarchyError> {
        self.state = DeletionState::Done;
        self.guard.take();
        tracing::info!(node = %self.node, cascade, "Location node deleted");

        self.service.rebuild().await;
        let payload = serde_json::json!({
            "cascade": cascade,
            "impact": self.impact,
        });
        self.service.publish(
            ConsoleEvent::new(event_types::LOCATION_DELETED)
                .with_node(self.node)
                .with_payload(payload),
        );
        Ok(self.state)
    }

    async fn finish_failed(&mut self, err: StoreError) -> Result<DeletionState, HierarchyError> {
        self.state = DeletionState::Failed;
        self.error = Some(err.clone());
        self.guard.take();
        tracing::error!(node = %self.node, error = %err, "Location delete failed");

        self.service.rebuild().await;
        Err(HierarchyError::DeleteFailed {
            node: self.node,
            source: err,
        })
    }

    fn invalid(&self, state: DeletionState, action: &'static str) -> HierarchyError {
        HierarchyError::InvalidTransition {
            node: self.node,
            state,
            action,
        }
    }

    async fn display_name(&self) -> String {
        self.service
            .snapshot()
            .await
            .index()
            .get(self.node)
            .map(|item| item.name.clone())
            .unwrap_or_else(|| self.node.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
