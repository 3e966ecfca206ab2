//! Row types for `regions`, `cities`, `barangays` and `locations`.
//!
//! Each row converts into the matching `isp_core` entity; timestamps are
//! kept on the row for auditing but the hierarchy engine does not use them.

use isp_core::hierarchy::{Barangay, City, Location, Region};
use isp_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `regions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegionRow {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `cities` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CityRow {
    pub id: DbId,
    pub region_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `barangays` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BarangayRow {
    pub id: DbId,
    pub city_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `locations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LocationRow {
    pub id: DbId,
    pub barangay_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<RegionRow> for Region {
    fn from(row: RegionRow) -> Self {
        Region {
            id: row.id,
            name: row.name,
        }
    }
}

impl From<CityRow> for City {
    fn from(row: CityRow) -> Self {
        City {
            id: row.id,
            name: row.name,
            region_id: row.region_id,
        }
    }
}

impl From<BarangayRow> for Barangay {
    fn from(row: BarangayRow) -> Self {
        Barangay {
            id: row.id,
            name: row.name,
            city_id: row.city_id,
        }
    }
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            name: row.name,
            barangay_id: row.barangay_id,
        }
    }
}
