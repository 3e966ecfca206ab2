//! Hierarchy service: snapshot ownership, rebuilds, view state and writes.
//!
//! The current [`HierarchySnapshot`] is an `Arc` that is swapped wholesale on
//! every rebuild and never mutated in place, so readers can hold on to a
//! snapshot for as long as they like without blocking a rebuild.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use isp_core::error::CoreError;
use isp_core::hierarchy::filter::resolve;
use isp_core::hierarchy::{
    build, DescendantCounts, Hierarchy, HierarchyIndex, HierarchyTree, LocationItem, LocationKind,
    NodeInput, NodeRef, RecordStore, ScopeFilter, StoreError,
};
use isp_core::types::{DbId, Timestamp};
use isp_events::{event_types, ConsoleEvent, EventBus};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::HierarchyConfig;
use crate::coordinator::{DeletionAttempt, InFlightRegistry};
use crate::error::HierarchyError;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A kind whose list read failed during a rebuild and was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchWarning {
    pub kind: LocationKind,
    pub message: String,
}

/// One immutable build of the hierarchy.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchySnapshot {
    /// Rebuild ticket that produced this snapshot; `0` for the initial empty one.
    pub generation: u64,
    pub built_at: Timestamp,
    pub hierarchy: Hierarchy,
    pub warnings: Vec<FetchWarning>,
}

impl HierarchySnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            hierarchy: Hierarchy::default(),
            warnings: Vec::new(),
        }
    }

    pub fn tree(&self) -> &HierarchyTree {
        &self.hierarchy.tree
    }

    pub fn index(&self) -> &HierarchyIndex {
        &self.hierarchy.index
    }

    pub fn counts(&self) -> &DescendantCounts {
        self.hierarchy.index.counts()
    }
}

/// Scope filter and search text of the hierarchy screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub scope: ScopeFilter,
    pub search: String,
}

// ---------------------------------------------------------------------------
// HierarchyService
// ---------------------------------------------------------------------------

pub struct HierarchyService<S> {
    pub(crate) store: Arc<S>,
    pub(crate) config: HierarchyConfig,
    snapshot: RwLock<Arc<HierarchySnapshot>>,
    view: RwLock<ViewState>,
    /// Ticket of the most recently requested rebuild.
    requested: AtomicU64,
    pub(crate) in_flight: InFlightRegistry,
    events: Option<Arc<EventBus>>,
}

impl<S: RecordStore + 'static> HierarchyService<S> {
    /// Create a service with an empty snapshot. Call [`rebuild`](Self::rebuild)
    /// for the initial load.
    pub fn new(store: Arc<S>, config: HierarchyConfig) -> Self {
        Self {
            store,
            config,
            snapshot: RwLock::new(Arc::new(HierarchySnapshot::empty())),
            view: RwLock::new(ViewState::default()),
            requested: AtomicU64::new(0),
            in_flight: InFlightRegistry::default(),
            events: None,
        }
    }

    /// Publish mutation events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // -- Snapshots -----------------------------------------------------------

    /// The current snapshot. Cheap: clones an `Arc`.
    pub async fn snapshot(&self) -> Arc<HierarchySnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn tree(&self) -> HierarchyTree {
        self.snapshot().await.tree().clone()
    }

    pub async fn index(&self) -> HierarchyIndex {
        self.snapshot().await.index().clone()
    }

    pub async fn counts(&self) -> DescendantCounts {
        self.snapshot().await.counts().clone()
    }

    // -- Rebuild -------------------------------------------------------------

    /// Fetch all four kinds concurrently and replace the snapshot.
    ///
    /// A kind whose read fails or times out is built as empty and recorded
    /// as a [`FetchWarning`]. Returns `None` when a newer rebuild (or
    /// [`discard_pending`](Self::discard_pending)) superseded this one while
    /// it was in flight; its results are then dropped unapplied.
    pub async fn rebuild(&self) -> Option<Arc<HierarchySnapshot>> {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;

        let (regions, cities, barangays, locations) = tokio::join!(
            self.fetch(LocationKind::Region, self.store.list_regions()),
            self.fetch(LocationKind::City, self.store.list_cities()),
            self.fetch(LocationKind::Barangay, self.store.list_barangays()),
            self.fetch(LocationKind::Location, self.store.list_locations()),
        );

        let warnings: Vec<FetchWarning> = [regions.1, cities.1, barangays.1, locations.1]
            .into_iter()
            .flatten()
            .collect();
        let hierarchy = build(&regions.0, &cities.0, &barangays.0, &locations.0);

        let snapshot = Arc::new(HierarchySnapshot {
            generation: ticket,
            built_at: Utc::now(),
            hierarchy,
            warnings,
        });

        {
            let mut current = self.snapshot.write().await;
            if ticket != self.requested.load(Ordering::SeqCst) || current.generation >= ticket {
                tracing::debug!(ticket, "Discarding superseded hierarchy rebuild");
                return None;
            }
            *current = Arc::clone(&snapshot);
        }

        tracing::info!(
            generation = ticket,
            items = snapshot.index().len(),
            warnings = snapshot.warnings.len(),
            "Location hierarchy rebuilt"
        );

        self.reset_stale_scope(snapshot.index()).await;
        Some(snapshot)
    }

    /// Drop the results of every rebuild currently in flight.
    ///
    /// The requests themselves still run to completion.
    pub fn discard_pending(&self) {
        self.requested.fetch_add(1, Ordering::SeqCst);
    }

    async fn fetch<T>(
        &self,
        kind: LocationKind,
        request: impl Future<Output = Result<Vec<T>, StoreError>>,
    ) -> (Vec<T>, Option<FetchWarning>) {
        match self.bounded(request).await {
            Ok(records) => (records, None),
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "Fetch failed, treating collection as empty");
                let warning = FetchWarning {
                    kind,
                    message: err.to_string(),
                };
                (Vec::new(), Some(warning))
            }
        }
    }

    /// Run a store call under the configured timeout.
    pub(crate) async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.config.store_timeout;
        tokio::time::timeout(limit, request)
            .await
            .unwrap_or(Err(StoreError::Timeout(limit)))
    }

    // -- View state ----------------------------------------------------------

    pub async fn view(&self) -> ViewState {
        self.view.read().await.clone()
    }

    pub async fn set_scope_filter(&self, scope: ScopeFilter) {
        self.view.write().await.scope = scope;
    }

    pub async fn set_search_text(&self, text: impl Into<String>) {
        self.view.write().await.search = text.into();
    }

    /// The ordered, visible item list for the current view state.
    pub async fn visible_items(&self) -> Vec<LocationItem> {
        let view = self.view().await;
        let snapshot = self.snapshot().await;
        resolve(snapshot.index(), view.scope, &view.search)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Fall back to [`ScopeFilter::All`] when the scoped node disappeared.
    async fn reset_stale_scope(&self, index: &HierarchyIndex) {
        let mut view = self.view.write().await;
        if let Some(target) = view.scope.target() {
            if !index.contains(target) {
                tracing::debug!(scope = %view.scope, "Scope target no longer exists, resetting");
                view.scope = ScopeFilter::All;
            }
        }
    }

    // -- Writes --------------------------------------------------------------

    /// Create a node under an existing parent and rebuild.
    pub async fn create_node(
        &self,
        kind: LocationKind,
        input: NodeInput,
    ) -> Result<NodeRef, HierarchyError> {
        let input = input.normalize(kind)?;
        self.ensure_parent_exists(kind, input.parent_id).await?;

        let id = self.bounded(self.store.create(kind, input)).await?;
        let node = NodeRef::new(kind, id);
        tracing::info!(node = %node, "Location node created");

        self.rebuild().await;
        self.publish(ConsoleEvent::new(event_types::LOCATION_CREATED).with_node(node));
        Ok(node)
    }

    /// Rename and/or re-parent a node and rebuild.
    pub async fn update_node(&self, node: NodeRef, input: NodeInput) -> Result<(), HierarchyError> {
        let input = input.normalize(node.kind)?;
        self.ensure_parent_exists(node.kind, input.parent_id).await?;

        self.bounded(self.store.update(node, input)).await?;
        tracing::info!(node = %node, "Location node updated");

        self.rebuild().await;
        self.publish(ConsoleEvent::new(event_types::LOCATION_UPDATED).with_node(node));
        Ok(())
    }

    async fn ensure_parent_exists(
        &self,
        kind: LocationKind,
        parent_id: Option<DbId>,
    ) -> Result<(), CoreError> {
        let (Some(parent_kind), Some(parent_id)) = (kind.parent(), parent_id) else {
            return Ok(());
        };
        let parent = NodeRef::new(parent_kind, parent_id);
        if self.snapshot().await.index().contains(parent) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!("Parent {parent} does not exist")))
        }
    }

    // -- Deletion ------------------------------------------------------------

    /// Start a deletion attempt for `node` in
    /// [`DeletionState::ConfirmBasic`](crate::DeletionState::ConfirmBasic).
    ///
    /// Rejected synchronously with
    /// [`HierarchyError::ConcurrentDeleteConflict`] while another attempt for
    /// the same node is still open.
    pub fn request_delete(
        self: &Arc<Self>,
        node: NodeRef,
    ) -> Result<DeletionAttempt<S>, HierarchyError> {
        let guard = self
            .in_flight
            .try_acquire(node)
            .ok_or(HierarchyError::ConcurrentDeleteConflict(node))?;
        tracing::debug!(node = %node, "Deletion requested");
        Ok(DeletionAttempt::new(Arc::clone(self), node, guard))
    }

    /// Nodes with an open deletion attempt.
    pub fn deletions_in_flight(&self) -> HashSet<NodeRef> {
        self.in_flight.snapshot()
    }

    // -- Events --------------------------------------------------------------

    pub(crate) fn publish(&self, event: ConsoleEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Rebuild whenever another writer publishes `locations.updated`.
    ///
    /// The task ends when the bus is dropped. A lagged receiver rebuilds once
    /// since it cannot know what it missed.
    pub fn spawn_event_listener(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.is(event_types::LOCATIONS_UPDATED) => {
                        tracing::debug!(source = ?event.node, "Locations updated externally");
                        service.rebuild().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event listener lagged, rebuilding");
                        service.rebuild().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Lock helper shared by the in-memory structures of this crate.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::tests::rizal_store;
    use crate::memory::MemoryRecordStore;

    fn service(store: MemoryRecordStore) -> Arc<HierarchyService<MemoryRecordStore>> {
        Arc::new(HierarchyService::new(Arc::new(store), HierarchyConfig::default()))
    }

    // -- Rebuild -------------------------------------------------------------

    #[tokio::test]
    async fn initial_snapshot_is_empty() {
        let service = service(rizal_store());
        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.index().is_empty());
    }

    #[tokio::test]
    async fn rebuild_loads_all_kinds() {
        let service = service(rizal_store());
        let snapshot = service.rebuild().await.expect("rebuild applies");
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.index().len(), 10);
        assert!(snapshot.warnings.is_empty());
        assert_eq!(service.counts().await.get(NodeRef::region(1)), 9);
        assert_eq!(service.tree().await.regions.len(), 1);
    }

    #[tokio::test]
    async fn failed_kind_degrades_to_empty_with_warning() {
        let store = rizal_store();
        store.fail_list(LocationKind::City, "network error");
        let service = service(store);

        let snapshot = service.rebuild().await.expect("rebuild applies");
        assert_eq!(
            snapshot.warnings,
            vec![FetchWarning {
                kind: LocationKind::City,
                message: "Store error: network error".to_string(),
            }]
        );
        // Only the kinds that loaded are counted.
        assert_eq!(snapshot.counts().get(NodeRef::region(1)), 0);
        assert!(snapshot.index().contains(NodeRef::barangay(100)));
        assert!(snapshot.index().get(NodeRef::barangay(100)).unwrap().is_orphan());
        assert_eq!(snapshot.counts().get(NodeRef::barangay(100)), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_kind_times_out_and_degrades() {
        let store = rizal_store();
        store.delay_list(LocationKind::Location, Duration::from_secs(60));
        let service = Arc::new(HierarchyService::new(
            Arc::new(store),
            HierarchyConfig {
                store_timeout: Duration::from_secs(1),
                ..HierarchyConfig::default()
            },
        ));

        let snapshot = service.rebuild().await.expect("rebuild applies");
        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].kind, LocationKind::Location);
        assert!(snapshot.warnings[0].message.contains("timed out"));
        assert_eq!(snapshot.counts().get(NodeRef::region(1)), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_rebuild_is_discarded() {
        let store = rizal_store();
        store.delay_list(LocationKind::Region, Duration::from_millis(500));
        let service = service(store);

        let slow = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.rebuild().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.discard_pending();

        assert!(slow.await.unwrap().is_none());
        assert_eq!(service.snapshot().await.generation, 0);
    }

    // -- View state ----------------------------------------------------------

    #[tokio::test]
    async fn visible_items_follow_scope_and_search() {
        let service = service(rizal_store());
        service.rebuild().await;

        service.set_scope_filter(ScopeFilter::Barangay(101)).await;
        service.set_search_text("hub").await;
        let items = service.visible_items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Pantok Hub");

        service.set_search_text("").await;
        let items = service.visible_items().await;
        assert_eq!(items[0].node(), NodeRef::barangay(101));
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn scope_resets_when_target_disappears() {
        let store = rizal_store();
        let service = service(store);
        service.rebuild().await;
        service.set_scope_filter(ScopeFilter::City(10)).await;

        service.store.remove_all(LocationKind::City);
        service.rebuild().await;
        assert_eq!(service.view().await.scope, ScopeFilter::All);
    }

    // -- Writes --------------------------------------------------------------

    #[tokio::test]
    async fn create_node_under_existing_parent() {
        let service = service(rizal_store());
        service.rebuild().await;

        let node = service
            .create_node(
                LocationKind::Location,
                NodeInput {
                    name: " Libid Annex ".to_string(),
                    parent_id: Some(100),
                },
            )
            .await
            .unwrap();

        let snapshot = service.snapshot().await;
        let item = snapshot.index().get(node).expect("created node is indexed");
        assert_eq!(item.name, "Libid Annex");
        assert_eq!(snapshot.counts().get(NodeRef::barangay(100)), 4);
    }

    #[tokio::test]
    async fn create_node_with_missing_parent_is_rejected() {
        let service = service(rizal_store());
        service.rebuild().await;

        let result = service
            .create_node(
                LocationKind::City,
                NodeInput {
                    name: "Nowhere".to_string(),
                    parent_id: Some(404),
                },
            )
            .await;
        assert_matches!(result, Err(HierarchyError::Core(CoreError::Validation(msg))) if msg.contains("Region #404"));
    }

    #[tokio::test]
    async fn update_node_renames_and_publishes() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let service = Arc::new(
            HierarchyService::new(Arc::new(rizal_store()), HierarchyConfig::default())
                .with_events(Arc::clone(&bus)),
        );
        service.rebuild().await;

        service
            .update_node(
                NodeRef::city(10),
                NodeInput {
                    name: "Binangonan City".to_string(),
                    parent_id: Some(1),
                },
            )
            .await
            .unwrap();

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.index().get(NodeRef::city(10)).unwrap().name, "Binangonan City");
        assert_eq!(
            snapshot.index().get(NodeRef::barangay(100)).unwrap().parent_name.as_deref(),
            Some("Binangonan City")
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, event_types::LOCATION_UPDATED);
        assert_eq!(event.node, Some(NodeRef::city(10)));
    }

    #[tokio::test]
    async fn update_missing_node_surfaces_not_found() {
        let service = service(rizal_store());
        service.rebuild().await;

        let result = service
            .update_node(
                NodeRef::region(404),
                NodeInput {
                    name: "Ghost".to_string(),
                    parent_id: None,
                },
            )
            .await;
        assert_matches!(result, Err(HierarchyError::Store(StoreError::NotFound(n))) if n == NodeRef::region(404));
    }

    // -- Events --------------------------------------------------------------

    #[tokio::test]
    async fn external_update_event_triggers_rebuild() {
        let bus = EventBus::default();
        let store = rizal_store();
        let service = service(store);
        service.rebuild().await;
        let listener = service.spawn_event_listener(&bus);

        service.store.remove_all(LocationKind::Location);
        bus.publish(ConsoleEvent::new(event_types::LOCATIONS_UPDATED).with_node(NodeRef::city(10)));

        let mut rebuilt = false;
        for _ in 0..100 {
            if service.snapshot().await.generation >= 2 {
                rebuilt = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(rebuilt, "listener should rebuild after locations.updated");
        assert_eq!(service.counts().await.get(NodeRef::region(1)), 3);

        drop(bus);
        listener.await.unwrap();
    }
}
