//! Entities of the four-level location hierarchy and the identifiers used
//! to address them.
//!
//! IDs are unique within their own kind only, so every cross-kind reference
//! goes through [`NodeRef`], never a bare [`DbId`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Root of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: DbId,
    pub name: String,
    pub region_id: DbId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barangay {
    pub id: DbId,
    pub name: String,
    pub city_id: DbId,
}

/// Leaf of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: DbId,
    pub name: String,
    pub barangay_id: DbId,
}

// ---------------------------------------------------------------------------
// LocationKind
// ---------------------------------------------------------------------------

/// Level of a node in the hierarchy, root first.
///
/// The derived `Ord` follows containment order, which is also the display
/// precedence used when sorting mixed-kind result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Region,
    City,
    Barangay,
    Location,
}

impl LocationKind {
    /// All kinds, root first.
    pub const ALL: [LocationKind; 4] = [
        LocationKind::Region,
        LocationKind::City,
        LocationKind::Barangay,
        LocationKind::Location,
    ];

    /// Lowercase identifier used in URLs, events and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            LocationKind::Region => "region",
            LocationKind::City => "city",
            LocationKind::Barangay => "barangay",
            LocationKind::Location => "location",
        }
    }

    /// Human-readable label, capitalised.
    pub fn label(self) -> &'static str {
        match self {
            LocationKind::Region => "Region",
            LocationKind::City => "City",
            LocationKind::Barangay => "Barangay",
            LocationKind::Location => "Location",
        }
    }

    /// Lowercase noun with a count-appropriate plural.
    pub fn noun(self, count: usize) -> &'static str {
        match (self, count == 1) {
            (LocationKind::Region, true) => "region",
            (LocationKind::Region, false) => "regions",
            (LocationKind::City, true) => "city",
            (LocationKind::City, false) => "cities",
            (LocationKind::Barangay, true) => "barangay",
            (LocationKind::Barangay, false) => "barangays",
            (LocationKind::Location, true) => "location",
            (LocationKind::Location, false) => "locations",
        }
    }

    /// The kind one level up, `None` for regions.
    pub fn parent(self) -> Option<LocationKind> {
        match self {
            LocationKind::Region => None,
            LocationKind::City => Some(LocationKind::Region),
            LocationKind::Barangay => Some(LocationKind::City),
            LocationKind::Location => Some(LocationKind::Barangay),
        }
    }

    /// The kind one level down, `None` for locations.
    pub fn child(self) -> Option<LocationKind> {
        match self {
            LocationKind::Region => Some(LocationKind::City),
            LocationKind::City => Some(LocationKind::Barangay),
            LocationKind::Barangay => Some(LocationKind::Location),
            LocationKind::Location => None,
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "region" | "regions" => Ok(LocationKind::Region),
            "city" | "cities" => Ok(LocationKind::City),
            "barangay" | "barangays" => Ok(LocationKind::Barangay),
            "location" | "locations" => Ok(LocationKind::Location),
            other => Err(CoreError::Validation(format!(
                "Unknown location kind '{other}'. Must be one of: region, city, barangay, location"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeRef
// ---------------------------------------------------------------------------

/// A `(kind, id)` pair uniquely identifying one node of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: LocationKind,
    pub id: DbId,
}

impl NodeRef {
    pub fn new(kind: LocationKind, id: DbId) -> Self {
        Self { kind, id }
    }

    pub fn region(id: DbId) -> Self {
        Self::new(LocationKind::Region, id)
    }

    pub fn city(id: DbId) -> Self {
        Self::new(LocationKind::City, id)
    }

    pub fn barangay(id: DbId) -> Self {
        Self::new(LocationKind::Barangay, id)
    }

    pub fn location(id: DbId) -> Self {
        Self::new(LocationKind::Location, id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind.label(), self.id)
    }
}

// ---------------------------------------------------------------------------
// NodeInput
// ---------------------------------------------------------------------------

/// Payload for creating or renaming a node at any level.
///
/// `parent_id` is required for every kind except [`LocationKind::Region`],
/// where it must be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NodeInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<DbId>,
}

impl NodeInput {
    /// Trim the name and check shape constraints for the given kind.
    ///
    /// Parent *existence* is not checked here since that needs a snapshot.
    pub fn normalize(self, kind: LocationKind) -> Result<NodeInput, CoreError> {
        let input = NodeInput {
            name: self.name.trim().to_string(),
            parent_id: self.parent_id,
        };
        input.validate()?;

        match (kind.parent(), input.parent_id) {
            (None, Some(_)) => Err(CoreError::Validation(
                "A region cannot have a parent".to_string(),
            )),
            (Some(parent), None) => Err(CoreError::Validation(format!(
                "A {} requires a parent {}",
                kind.as_str(),
                parent.as_str()
            ))),
            _ => Ok(input),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
