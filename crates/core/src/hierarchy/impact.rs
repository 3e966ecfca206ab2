//! Cascade impact analysis.
//!
//! [`analyze`] answers "what disappears if this node is deleted together with
//! everything below it?" from the current index alone. It never mutates
//! anything and is computed before a delete is attempted, so the operator
//! sees the numbers instead of a server error.

use serde::{Deserialize, Serialize};

use crate::hierarchy::index::HierarchyIndex;
use crate::hierarchy::model::{LocationKind, NodeRef};

/// Descendant counts by kind for one cascade target.
///
/// Only the kinds strictly below the target are populated: a region reports
/// cities, barangays and locations; a city reports barangays and locations;
/// a barangay reports locations; a location reports nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub kind: LocationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cities: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barangays: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<usize>,
}

impl ImpactSummary {
    /// All-zero summary shaped for a target of `kind`.
    pub fn empty(kind: LocationKind) -> Self {
        let below = |k: LocationKind| (k > kind).then_some(0);
        Self {
            kind,
            cities: below(LocationKind::City),
            barangays: below(LocationKind::Barangay),
            locations: below(LocationKind::Location),
        }
    }

    /// Summary from raw counts, dropping kinds that cannot sit below `kind`.
    pub fn from_counts(kind: LocationKind, cities: usize, barangays: usize, locations: usize) -> Self {
        let mut summary = Self::empty(kind);
        summary.cities = summary.cities.map(|_| cities);
        summary.barangays = summary.barangays.map(|_| barangays);
        summary.locations = summary.locations.map(|_| locations);
        summary
    }

    pub fn count(&self, kind: LocationKind) -> Option<usize> {
        match kind {
            LocationKind::Region => None,
            LocationKind::City => self.cities,
            LocationKind::Barangay => self.barangays,
            LocationKind::Location => self.locations,
        }
    }

    pub fn total(&self) -> usize {
        [self.cities, self.barangays, self.locations]
            .into_iter()
            .flatten()
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero `(kind, count)` pairs, root first.
    pub fn entries(&self) -> Vec<(LocationKind, usize)> {
        LocationKind::ALL
            .into_iter()
            .filter_map(|kind| self.count(kind).map(|n| (kind, n)))
            .filter(|&(_, n)| n > 0)
            .collect()
    }

    /// Human-readable enumeration, e.g. `"1 city, 2 barangays and 6 locations"`.
    ///
    /// Empty string for a summary with nothing below the target.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(kind, n)| format!("{n} {}", kind.noun(n)))
            .collect();

        match parts.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [init @ .., last] => format!("{} and {last}", init.join(", ")),
        }
    }

    fn record(&mut self, kind: LocationKind) {
        let slot = match kind {
            LocationKind::Region => return,
            LocationKind::City => &mut self.cities,
            LocationKind::Barangay => &mut self.barangays,
            LocationKind::Location => &mut self.locations,
        };
        if let Some(n) = slot {
            *n += 1;
        }
    }
}

/// Compute what a cascade delete of `node` would remove.
///
/// Returns `None` when the node is not in the index (stale local data); the
/// caller should then fall back to the store's own conflict report.
pub fn analyze(node: NodeRef, index: &HierarchyIndex) -> Option<ImpactSummary> {
    if !index.contains(node) {
        return None;
    }
    let mut summary = ImpactSummary::empty(node.kind);
    for item in index.descendants(node) {
        summary.record(item.kind);
    }
    Some(summary)
}

/// Level-agnostic first prompt shown before any delete is attempted.
pub fn basic_prompt(kind: LocationKind, name: &str) -> String {
    format!(
        "Are you sure you want to delete {} \"{name}\"?",
        kind.as_str()
    )
}

/// Second prompt shown once a node turns out to have descendants.
///
/// Falls back to the plain wording when the summary is empty.
pub fn cascade_prompt(name: &str, summary: &ImpactSummary) -> String {
    if summary.is_empty() {
        return basic_prompt(summary.kind, name);
    }
    format!(
        "{} \"{name}\" contains {}. Deleting it will permanently delete all of them. Continue?",
        summary.kind.label(),
        summary.describe()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
