//! In-memory [`RecordStore`] for tests and local runs without a database.
//!
//! Behaves like the PostgreSQL store where it matters to the engine: a
//! non-cascading delete of a node with children is refused with a conflict
//! that carries the store's own impact counts, and a cascading delete
//! removes the whole subtree at once. Faults (failed or slow reads and
//! deletes) can be injected per kind.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use isp_core::hierarchy::impact::analyze;
use isp_core::hierarchy::{
    build, Barangay, City, ConflictInfo, HierarchyIndex, ImpactSummary, Location, LocationKind,
    NodeInput, NodeRef, RecordStore, Region, StoreError,
};
use isp_core::types::DbId;

use crate::service::lock;

/// One call to [`RecordStore::delete`], in the order received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteCall {
    pub node: NodeRef,
    pub cascade: bool,
}

#[derive(Debug, Clone, Default)]
struct Records {
    regions: Vec<Region>,
    cities: Vec<City>,
    barangays: Vec<Barangay>,
    locations: Vec<Location>,
}

impl Records {
    fn index(&self) -> HierarchyIndex {
        build(&self.regions, &self.cities, &self.barangays, &self.locations).index
    }

    fn contains(&self, node: NodeRef) -> bool {
        let id = node.id;
        match node.kind {
            LocationKind::Region => self.regions.iter().any(|r| r.id == id),
            LocationKind::City => self.cities.iter().any(|c| c.id == id),
            LocationKind::Barangay => self.barangays.iter().any(|b| b.id == id),
            LocationKind::Location => self.locations.iter().any(|l| l.id == id),
        }
    }

    fn remove(&mut self, node: NodeRef) {
        let id = node.id;
        match node.kind {
            LocationKind::Region => self.regions.retain(|r| r.id != id),
            LocationKind::City => self.cities.retain(|c| c.id != id),
            LocationKind::Barangay => self.barangays.retain(|b| b.id != id),
            LocationKind::Location => self.locations.retain(|l| l.id != id),
        }
    }

    fn next_id(&self, kind: LocationKind) -> DbId {
        let max = match kind {
            LocationKind::Region => self.regions.iter().map(|r| r.id).max(),
            LocationKind::City => self.cities.iter().map(|c| c.id).max(),
            LocationKind::Barangay => self.barangays.iter().map(|b| b.id).max(),
            LocationKind::Location => self.locations.iter().map(|l| l.id).max(),
        };
        max.unwrap_or(0) + 1
    }

    fn check_parent(&self, kind: LocationKind, parent_id: Option<DbId>) -> Result<(), StoreError> {
        match (kind.parent(), parent_id) {
            (Some(parent_kind), Some(id)) => {
                let parent = NodeRef::new(parent_kind, id);
                if self.contains(parent) {
                    Ok(())
                } else {
                    Err(StoreError::NotFound(parent))
                }
            }
            (Some(_), None) => Err(StoreError::Backend(format!("{kind} requires a parent"))),
            (None, _) => Ok(()),
        }
    }

    fn insert(&mut self, kind: LocationKind, id: DbId, name: String, parent_id: Option<DbId>) {
        let parent = parent_id.unwrap_or_default();
        match kind {
            LocationKind::Region => self.regions.push(Region { id, name }),
            LocationKind::City => self.cities.push(City {
                id,
                name,
                region_id: parent,
            }),
            LocationKind::Barangay => self.barangays.push(Barangay {
                id,
                name,
                city_id: parent,
            }),
            LocationKind::Location => self.locations.push(Location {
                id,
                name,
                barangay_id: parent,
            }),
        }
    }

    fn rewrite(&mut self, node: NodeRef, name: String, parent_id: Option<DbId>) {
        let id = node.id;
        let parent = parent_id.unwrap_or_default();
        match node.kind {
            LocationKind::Region => {
                if let Some(r) = self.regions.iter_mut().find(|r| r.id == id) {
                    r.name = name;
                }
            }
            LocationKind::City => {
                if let Some(c) = self.cities.iter_mut().find(|c| c.id == id) {
                    c.name = name;
                    c.region_id = parent;
                }
            }
            LocationKind::Barangay => {
                if let Some(b) = self.barangays.iter_mut().find(|b| b.id == id) {
                    b.name = name;
                    b.city_id = parent;
                }
            }
            LocationKind::Location => {
                if let Some(l) = self.locations.iter_mut().find(|l| l.id == id) {
                    l.name = name;
                    l.barangay_id = parent;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    list_failures: HashMap<LocationKind, String>,
    list_delays: HashMap<LocationKind, Duration>,
    delete_failure: Option<String>,
    delete_delay: Option<Duration>,
}

/// Mutex-guarded record sets with fault injection.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Records>,
    faults: Mutex<Faults>,
    deletes: Mutex<Vec<DeleteCall>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(
        regions: Vec<Region>,
        cities: Vec<City>,
        barangays: Vec<Barangay>,
        locations: Vec<Location>,
    ) -> Self {
        let store = Self::default();
        *lock(&store.records) = Records {
            regions,
            cities,
            barangays,
            locations,
        };
        store
    }

    // -- Seeding -------------------------------------------------------------

    pub fn insert_region(&self, id: DbId, name: &str) {
        lock(&self.records).insert(LocationKind::Region, id, name.to_string(), None);
    }

    pub fn insert_city(&self, id: DbId, name: &str, region_id: DbId) {
        lock(&self.records).insert(LocationKind::City, id, name.to_string(), Some(region_id));
    }

    pub fn insert_barangay(&self, id: DbId, name: &str, city_id: DbId) {
        lock(&self.records).insert(LocationKind::Barangay, id, name.to_string(), Some(city_id));
    }

    pub fn insert_location(&self, id: DbId, name: &str, barangay_id: DbId) {
        lock(&self.records).insert(LocationKind::Location, id, name.to_string(), Some(barangay_id));
    }

    /// Remove a single record without touching its children.
    pub fn remove(&self, node: NodeRef) {
        lock(&self.records).remove(node);
    }

    pub fn remove_all(&self, kind: LocationKind) {
        let mut records = lock(&self.records);
        match kind {
            LocationKind::Region => records.regions.clear(),
            LocationKind::City => records.cities.clear(),
            LocationKind::Barangay => records.barangays.clear(),
            LocationKind::Location => records.locations.clear(),
        }
    }

    // -- Fault injection -----------------------------------------------------

    /// Make every list read of `kind` fail with `message`.
    pub fn fail_list(&self, kind: LocationKind, message: &str) {
        lock(&self.faults).list_failures.insert(kind, message.to_string());
    }

    /// Make every list read of `kind` take at least `delay`.
    pub fn delay_list(&self, kind: LocationKind, delay: Duration) {
        lock(&self.faults).list_delays.insert(kind, delay);
    }

    pub fn fail_deletes(&self, message: &str) {
        lock(&self.faults).delete_failure = Some(message.to_string());
    }

    pub fn delay_deletes(&self, delay: Duration) {
        lock(&self.faults).delete_delay = Some(delay);
    }

    pub fn clear_faults(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// Every delete received so far.
    pub fn delete_calls(&self) -> Vec<DeleteCall> {
        lock(&self.deletes).clone()
    }

    // -- Internals -----------------------------------------------------------

    async fn list<T: Send>(
        &self,
        kind: LocationKind,
        read: impl FnOnce(&Records) -> Vec<T> + Send,
    ) -> Result<Vec<T>, StoreError> {
        let (delay, failure) = {
            let faults = lock(&self.faults);
            (
                faults.list_delays.get(&kind).copied(),
                faults.list_failures.get(&kind).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(StoreError::Backend(message));
        }
        let records = lock(&self.records);
        Ok(read(&records))
    }
}

impl RecordStore for MemoryRecordStore {
    async fn list_regions(&self) -> Result<Vec<Region>, StoreError> {
        self.list(LocationKind::Region, |r| r.regions.clone()).await
    }

    async fn list_cities(&self) -> Result<Vec<City>, StoreError> {
        self.list(LocationKind::City, |r| r.cities.clone()).await
    }

    async fn list_barangays(&self) -> Result<Vec<Barangay>, StoreError> {
        self.list(LocationKind::Barangay, |r| r.barangays.clone()).await
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        self.list(LocationKind::Location, |r| r.locations.clone()).await
    }

    async fn delete(&self, node: NodeRef, cascade: bool) -> Result<(), StoreError> {
        lock(&self.deletes).push(DeleteCall { node, cascade });

        let (delay, failure) = {
            let faults = lock(&self.faults);
            (faults.delete_delay, faults.delete_failure.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(StoreError::Backend(message));
        }

        let mut records = lock(&self.records);
        if !records.contains(node) {
            return Err(StoreError::NotFound(node));
        }

        let index = records.index();
        let subtree: Vec<NodeRef> = index.descendants(node).map(|item| item.node()).collect();
        if !cascade && !subtree.is_empty() {
            let impact = analyze(node, &index).unwrap_or(ImpactSummary::empty(node.kind));
            return Err(StoreError::Conflict(ConflictInfo { node, impact }));
        }

        for child in subtree {
            records.remove(child);
        }
        records.remove(node);
        Ok(())
    }

    async fn create(&self, kind: LocationKind, input: NodeInput) -> Result<DbId, StoreError> {
        let mut records = lock(&self.records);
        records.check_parent(kind, input.parent_id)?;
        let id = records.next_id(kind);
        records.insert(kind, id, input.name, input.parent_id);
        Ok(id)
    }

    async fn update(&self, node: NodeRef, input: NodeInput) -> Result<(), StoreError> {
        let mut records = lock(&self.records);
        if !records.contains(node) {
            return Err(StoreError::NotFound(node));
        }
        records.check_parent(node.kind, input.parent_id)?;
        records.rewrite(node, input.name, input.parent_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
