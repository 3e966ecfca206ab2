//! Hierarchy index builder.
//!
//! [`build`] turns the four flat collections into a containment tree and a
//! flattened [`LocationItem`] index with per-node descendant counts. It is a
//! pure function: the same input always yields the same output, and the whole
//! structure is rebuilt rather than patched whenever any collection changes.
//!
//! Cost is linear in the total number of records: one lookup pass per kind,
//! then a single merge pass that emits items and accumulates counts.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::hierarchy::model::{Barangay, City, Location, LocationKind, NodeRef, Region};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// LocationItem
// ---------------------------------------------------------------------------

/// Uniform projection of a node at any level.
///
/// `parent_id` is the parent reference exactly as declared by the record,
/// even when it dangles. `region_id`, `city_id` and `barangay_id` form the
/// *resolved* ancestor chain: an id is only present when the referenced
/// node exists in the same snapshot. An orphan therefore has a `parent_id`
/// but no `parent_name` and an empty chain above the break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationItem {
    pub id: DbId,
    pub name: String,
    pub kind: LocationKind,
    pub parent_id: Option<DbId>,
    pub parent_name: Option<String>,
    pub region_id: Option<DbId>,
    pub city_id: Option<DbId>,
    pub barangay_id: Option<DbId>,
}

impl LocationItem {
    pub fn node(&self) -> NodeRef {
        NodeRef::new(self.kind, self.id)
    }

    /// Resolved ancestor of the given kind.
    pub fn ancestor(&self, kind: LocationKind) -> Option<DbId> {
        match kind {
            LocationKind::Region => self.region_id,
            LocationKind::City => self.city_id,
            LocationKind::Barangay => self.barangay_id,
            LocationKind::Location => None,
        }
    }

    /// Whether `node` is this item or one of its resolved ancestors.
    pub fn is_within(&self, node: NodeRef) -> bool {
        self.node() == node || self.ancestor(node.kind) == Some(node.id)
    }

    /// Whether `node` is a strict resolved ancestor of this item.
    pub fn descends_from(&self, node: NodeRef) -> bool {
        self.node() != node && self.ancestor(node.kind) == Some(node.id)
    }

    /// A non-root item whose declared parent is missing from the snapshot.
    pub fn is_orphan(&self) -> bool {
        self.parent_id.is_some() && self.parent_name.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyTree {
    pub regions: Vec<RegionNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionNode {
    #[serde(flatten)]
    pub region: Region,
    pub cities: Vec<CityNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityNode {
    #[serde(flatten)]
    pub city: City,
    pub barangays: Vec<BarangayNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarangayNode {
    #[serde(flatten)]
    pub barangay: Barangay,
    pub locations: Vec<Location>,
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Number of items below each node, keyed by id within each kind.
///
/// Every node present in the snapshot has an entry, zero when it has no
/// descendants. Ordered maps keep serialization stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescendantCounts {
    pub by_region: BTreeMap<DbId, usize>,
    pub by_city: BTreeMap<DbId, usize>,
    pub by_barangay: BTreeMap<DbId, usize>,
}

impl DescendantCounts {
    /// Descendant count for a node; locations and unknown nodes yield zero.
    pub fn get(&self, node: NodeRef) -> usize {
        let map = match node.kind {
            LocationKind::Region => &self.by_region,
            LocationKind::City => &self.by_city,
            LocationKind::Barangay => &self.by_barangay,
            LocationKind::Location => return 0,
        };
        map.get(&node.id).copied().unwrap_or(0)
    }

    fn bump(&mut self, kind: LocationKind, id: DbId) {
        let map = match kind {
            LocationKind::Region => &mut self.by_region,
            LocationKind::City => &mut self.by_city,
            LocationKind::Barangay => &mut self.by_barangay,
            LocationKind::Location => return,
        };
        *map.entry(id).or_insert(0) += 1;
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Flattened view of every node plus descendant counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HierarchyIndex {
    items: Vec<LocationItem>,
    counts: DescendantCounts,
    #[serde(skip)]
    positions: HashMap<NodeRef, usize>,
}

impl HierarchyIndex {
    pub fn items(&self) -> &[LocationItem] {
        &self.items
    }

    pub fn counts(&self) -> &DescendantCounts {
        &self.counts
    }

    pub fn get(&self, node: NodeRef) -> Option<&LocationItem> {
        self.positions.get(&node).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, node: NodeRef) -> bool {
        self.positions.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Strict descendants of `node`, in index order.
    pub fn descendants(&self, node: NodeRef) -> impl Iterator<Item = &LocationItem> {
        self.items.iter().filter(move |item| item.descends_from(node))
    }

    /// Items whose declared parent is missing from the snapshot.
    pub fn orphans(&self) -> impl Iterator<Item = &LocationItem> {
        self.items.iter().filter(|item| item.is_orphan())
    }
}

impl PartialEq for HierarchyIndex {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items && self.counts == other.counts
    }
}

impl Eq for HierarchyIndex {}

/// Result of [`build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    pub tree: HierarchyTree,
    pub index: HierarchyIndex,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Resolved link from a node to its parent and the chain above it.
struct Link<'a> {
    name: &'a str,
    city_id: Option<DbId>,
    region_id: Option<DbId>,
}

/// Build the tree and index from flat record sets.
///
/// Input order only affects output order; it never affects membership or
/// counts. Orphans (a dangling parent reference at any level) are left out
/// of the tree and of every ancestor aggregate, but still appear once in the
/// index with `parent_name = None`.
pub fn build(
    regions: &[Region],
    cities: &[City],
    barangays: &[Barangay],
    locations: &[Location],
) -> Hierarchy {
    // Pass 1: lookups per kind, each resolving through the kind above.
    let region_links: HashMap<DbId, &str> =
        regions.iter().map(|r| (r.id, r.name.as_str())).collect();

    let city_links: HashMap<DbId, Link<'_>> = cities
        .iter()
        .map(|c| {
            let region_id = region_links.contains_key(&c.region_id).then_some(c.region_id);
            let link = Link {
                name: c.name.as_str(),
                city_id: None,
                region_id,
            };
            (c.id, link)
        })
        .collect();

    let barangay_links: HashMap<DbId, Link<'_>> = barangays
        .iter()
        .map(|b| {
            let parent = city_links.get(&b.city_id);
            let link = Link {
                name: b.name.as_str(),
                city_id: parent.map(|_| b.city_id),
                region_id: parent.and_then(|p| p.region_id),
            };
            (b.id, link)
        })
        .collect();

    // Pass 2: emit items and accumulate counts.
    let total = regions.len() + cities.len() + barangays.len() + locations.len();
    let mut items = Vec::with_capacity(total);
    let mut counts = DescendantCounts::default();

    for region in regions {
        counts.by_region.entry(region.id).or_insert(0);
        items.push(LocationItem {
            id: region.id,
            name: region.name.clone(),
            kind: LocationKind::Region,
            parent_id: None,
            parent_name: None,
            region_id: None,
            city_id: None,
            barangay_id: None,
        });
    }

    for city in cities {
        counts.by_city.entry(city.id).or_insert(0);
        let region_name = region_links.get(&city.region_id).copied();
        items.push(LocationItem {
            id: city.id,
            name: city.name.clone(),
            kind: LocationKind::City,
            parent_id: Some(city.region_id),
            parent_name: region_name.map(str::to_string),
            region_id: region_name.map(|_| city.region_id),
            city_id: None,
            barangay_id: None,
        });
    }

    for barangay in barangays {
        counts.by_barangay.entry(barangay.id).or_insert(0);
        let parent = city_links.get(&barangay.city_id);
        items.push(LocationItem {
            id: barangay.id,
            name: barangay.name.clone(),
            kind: LocationKind::Barangay,
            parent_id: Some(barangay.city_id),
            parent_name: parent.map(|p| p.name.to_string()),
            region_id: parent.and_then(|p| p.region_id),
            city_id: parent.map(|_| barangay.city_id),
            barangay_id: None,
        });
    }

    for location in locations {
        let parent = barangay_links.get(&location.barangay_id);
        items.push(LocationItem {
            id: location.id,
            name: location.name.clone(),
            kind: LocationKind::Location,
            parent_id: Some(location.barangay_id),
            parent_name: parent.map(|p| p.name.to_string()),
            region_id: parent.and_then(|p| p.region_id),
            city_id: parent.and_then(|p| p.city_id),
            barangay_id: parent.map(|_| location.barangay_id),
        });
    }

    let mut positions = HashMap::with_capacity(items.len());
    for (pos, item) in items.iter().enumerate() {
        for kind in [
            LocationKind::Region,
            LocationKind::City,
            LocationKind::Barangay,
        ] {
            if let Some(ancestor) = item.ancestor(kind) {
                counts.bump(kind, ancestor);
            }
        }
        // First occurrence wins if a source ever repeats an id.
        positions.entry(item.node()).or_insert(pos);
    }

    let tree = build_tree(regions, cities, barangays, locations);
    let index = HierarchyIndex {
        items,
        counts,
        positions,
    };

    Hierarchy { tree, index }
}

/// Group children under their parents, bottom-up. Orphans are dropped.
fn build_tree(
    regions: &[Region],
    cities: &[City],
    barangays: &[Barangay],
    locations: &[Location],
) -> HierarchyTree {
    let mut locations_by_barangay: HashMap<DbId, Vec<Location>> = HashMap::new();
    for location in locations {
        locations_by_barangay
            .entry(location.barangay_id)
            .or_default()
            .push(location.clone());
    }

    let mut barangays_by_city: HashMap<DbId, Vec<BarangayNode>> = HashMap::new();
    for barangay in barangays {
        let node = BarangayNode {
            barangay: barangay.clone(),
            locations: locations_by_barangay.remove(&barangay.id).unwrap_or_default(),
        };
        barangays_by_city.entry(barangay.city_id).or_default().push(node);
    }

    let mut cities_by_region: HashMap<DbId, Vec<CityNode>> = HashMap::new();
    for city in cities {
        let node = CityNode {
            city: city.clone(),
            barangays: barangays_by_city.remove(&city.id).unwrap_or_default(),
        };
        cities_by_region.entry(city.region_id).or_default().push(node);
    }

    let regions = regions
        .iter()
        .map(|region| RegionNode {
            region: region.clone(),
            cities: cities_by_region.remove(&region.id).unwrap_or_default(),
        })
        .collect();

    HierarchyTree { regions }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
