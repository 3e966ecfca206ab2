//! Scope filter and free-text search over the location index.
//!
//! [`resolve`] is re-run on every filter change or keystroke, so it is pure
//! and cheap: one pass to select, one sort with cached keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hierarchy::index::{HierarchyIndex, LocationItem};
use crate::hierarchy::model::{LocationKind, NodeRef};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// ScopeFilter
// ---------------------------------------------------------------------------

/// Active hierarchy restriction for the displayed list.
///
/// Text form is `all` or `<kind>:<id>`, e.g. `city:5`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScopeFilter {
    #[default]
    All,
    Region(DbId),
    City(DbId),
    Barangay(DbId),
}

impl ScopeFilter {
    /// The node this filter is anchored on, `None` for [`ScopeFilter::All`].
    pub fn target(self) -> Option<NodeRef> {
        match self {
            ScopeFilter::All => None,
            ScopeFilter::Region(id) => Some(NodeRef::region(id)),
            ScopeFilter::City(id) => Some(NodeRef::city(id)),
            ScopeFilter::Barangay(id) => Some(NodeRef::barangay(id)),
        }
    }

    /// Whether `item` is the target or lies below it.
    pub fn matches(self, item: &LocationItem) -> bool {
        match self.target() {
            None => true,
            Some(node) => item.is_within(node),
        }
    }
}

impl TryFrom<NodeRef> for ScopeFilter {
    type Error = CoreError;

    fn try_from(node: NodeRef) -> Result<Self, Self::Error> {
        match node.kind {
            LocationKind::Region => Ok(ScopeFilter::Region(node.id)),
            LocationKind::City => Ok(ScopeFilter::City(node.id)),
            LocationKind::Barangay => Ok(ScopeFilter::Barangay(node.id)),
            LocationKind::Location => Err(CoreError::Validation(
                "A location cannot be used as a scope filter".to_string(),
            )),
        }
    }
}

impl fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            None => f.write_str("all"),
            Some(node) => write!(f, "{}:{}", node.kind, node.id),
        }
    }
}

impl FromStr for ScopeFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(ScopeFilter::All);
        }
        let (kind, id) = s.split_once(':').ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid scope '{s}'. Expected 'all' or '<kind>:<id>'"
            ))
        })?;
        let kind: LocationKind = kind.parse()?;
        let id: DbId = id
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("Invalid scope id '{id}'")))?;
        ScopeFilter::try_from(NodeRef::new(kind, id))
    }
}

impl TryFrom<String> for ScopeFilter {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScopeFilter> for String {
    fn from(filter: ScopeFilter) -> Self {
        filter.to_string()
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Case-insensitive substring match on the item's name or its parent's name.
///
/// `needle` must already be lowercased; an empty needle matches everything.
fn matches_search(item: &LocationItem, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    item.name.to_lowercase().contains(needle)
        || item
            .parent_name
            .as_deref()
            .is_some_and(|parent| parent.to_lowercase().contains(needle))
}

/// Select and order the visible items.
///
/// An item must satisfy both the scope and the search text. The scope target
/// itself is pinned first; everything else sorts by kind (region, city,
/// barangay, location), then case-insensitive name, then id.
pub fn resolve<'a>(
    index: &'a HierarchyIndex,
    scope: ScopeFilter,
    search: &str,
) -> Vec<&'a LocationItem> {
    let needle = search.trim().to_lowercase();
    let pinned = scope.target();

    let mut selected: Vec<&LocationItem> = index
        .items()
        .iter()
        .filter(|item| scope.matches(item) && matches_search(item, &needle))
        .collect();

    selected.sort_by_cached_key(|item| {
        (
            Some(item.node()) != pinned,
            item.kind,
            item.name.to_lowercase(),
            item.id,
        )
    });
    selected
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::index::build;
    use crate::hierarchy::index::tests::{barangay, city, generated, location, region, rizal};
    use assert_matches::assert_matches;

    fn names(items: &[&LocationItem]) -> Vec<String> {
        items.iter().map(|i| i.name.clone()).collect()
    }

    // -- ScopeFilter parsing -------------------------------------------------

    #[test]
    fn scope_parses_all_and_targets() {
        assert_eq!("all".parse::<ScopeFilter>().unwrap(), ScopeFilter::All);
        assert_eq!("".parse::<ScopeFilter>().unwrap(), ScopeFilter::All);
        assert_eq!("city:5".parse::<ScopeFilter>().unwrap(), ScopeFilter::City(5));
        assert_eq!(
            "Barangay: 12".parse::<ScopeFilter>().unwrap(),
            ScopeFilter::Barangay(12)
        );
    }

    #[test]
    fn scope_rejects_location_and_garbage() {
        assert_matches!("location:3".parse::<ScopeFilter>(), Err(CoreError::Validation(_)));
        assert_matches!("city".parse::<ScopeFilter>(), Err(CoreError::Validation(_)));
        assert_matches!("city:x".parse::<ScopeFilter>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn scope_display_round_trips() {
        for scope in [ScopeFilter::All, ScopeFilter::Region(1), ScopeFilter::Barangay(9)] {
            assert_eq!(scope.to_string().parse::<ScopeFilter>().unwrap(), scope);
        }
    }

    // -- Scope membership ----------------------------------------------------

    #[test]
    fn region_scope_includes_region_and_descendants() {
        let index = rizal().index;
        let result = resolve(&index, ScopeFilter::Region(1), "");
        assert_eq!(result.len(), index.len());
        assert_eq!(result[0].node(), NodeRef::region(1));
    }

    #[test]
    fn barangay_scope_excludes_siblings() {
        let index = rizal().index;
        let result = resolve(&index, ScopeFilter::Barangay(100), "");
        assert_eq!(
            names(&result),
            vec!["Libid", "Libid Cabinet", "Libid Hub", "Libid Tower"]
        );
    }

    #[test]
    fn orphan_matches_its_own_scope_only() {
        let index = build(
            &[region(1, "Rizal")],
            &[city(11, "Lost City", 99)],
            &[],
            &[],
        )
        .index;
        assert_eq!(names(&resolve(&index, ScopeFilter::City(11), "")), vec!["Lost City"]);
        assert_eq!(names(&resolve(&index, ScopeFilter::Region(1), "")), vec!["Rizal"]);
    }

    // -- Search --------------------------------------------------------------

    #[test]
    fn search_matches_name_or_parent_name() {
        let index = build(
            &[region(1, "Rizal")],
            &[city(10, "Binangonan", 1), city(11, "Cainta", 1)],
            &[barangay(100, "Libid", 10), barangay(101, "San Juan", 11)],
            &[location(1000, "Tower A", 100)],
        )
        .index;

        let result = resolve(&index, ScopeFilter::All, "binang");
        assert_eq!(names(&result), vec!["Binangonan", "Libid"]);
        assert_eq!(result[0].kind, LocationKind::City);
        assert_eq!(result[1].kind, LocationKind::Barangay);
    }

    #[test]
    fn search_is_case_insensitive_and_trimmed() {
        let index = rizal().index;
        let result = resolve(&index, ScopeFilter::All, "  PANTOK ");
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|i| {
            i.name.contains("Pantok") || i.parent_name.as_deref() == Some("Pantok")
        }));
    }

    #[test]
    fn search_and_scope_are_combined() {
        let index = rizal().index;
        let result = resolve(&index, ScopeFilter::Barangay(101), "tower");
        assert_eq!(names(&result), vec!["Pantok Tower"]);
    }

    #[test]
    fn search_without_match_is_empty() {
        let index = rizal().index;
        assert!(resolve(&index, ScopeFilter::All, "quezon").is_empty());
    }

    // -- Ordering ------------------------------------------------------------

    #[test]
    fn all_scope_sorts_by_kind_then_name() {
        let index = build(
            &[region(2, "zamboanga"), region(1, "Abra")],
            &[city(10, "Bangued", 1)],
            &[],
            &[],
        )
        .index;
        assert_eq!(
            names(&resolve(&index, ScopeFilter::All, "")),
            vec!["Abra", "zamboanga", "Bangued"]
        );
    }

    #[test]
    fn scope_target_is_pinned_first() {
        for seed in 0..25 {
            let (regions, cities, barangays, locations) = generated(seed);
            let index = build(&regions, &cities, &barangays, &locations).index;
            for c in &cities {
                let result = resolve(&index, ScopeFilter::City(c.id), "");
                assert_eq!(result[0].node(), NodeRef::city(c.id), "seed {seed}");
            }
        }
    }

    #[test]
    fn pinned_target_precedes_higher_ranked_kinds() {
        // Only the barangay and its locations are in scope, but the pin must
        // also win over alphabetical order within the scope.
        let index = build(
            &[region(1, "Rizal")],
            &[city(10, "Binangonan", 1)],
            &[barangay(100, "Zulu", 10)],
            &[location(1000, "Alpha", 100)],
        )
        .index;
        assert_eq!(
            names(&resolve(&index, ScopeFilter::Barangay(100), "")),
            vec!["Zulu", "Alpha"]
        );
    }

    #[test]
    fn resolve_is_idempotent() {
        let (regions, cities, barangays, locations) = generated(7);
        let index = build(&regions, &cities, &barangays, &locations).index;
        for scope in [ScopeFilter::All, ScopeFilter::Region(0), ScopeFilter::City(1)] {
            let first = resolve(&index, scope, "1");
            let second = resolve(&index, scope, "1");
            assert_eq!(first, second);
        }
    }
}
