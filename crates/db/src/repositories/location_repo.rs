//! Repository for the four location tables.
//!
//! All four tables share one shape (`id`, `name`, one parent column), so
//! writes and subtree queries are built from [`table_name`] and
//! [`parent_column`] instead of being repeated per kind.

use isp_core::hierarchy::{ImpactSummary, LocationKind, NodeRef};
use isp_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::location::{BarangayRow, CityRow, LocationRow, RegionRow};

const REGION_COLUMNS: &str = "id, name, created_at, updated_at";
const CITY_COLUMNS: &str = "id, region_id, name, created_at, updated_at";
const BARANGAY_COLUMNS: &str = "id, city_id, name, created_at, updated_at";
const LOCATION_COLUMNS: &str = "id, barangay_id, name, created_at, updated_at";

/// Result of a single-node delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The node still has children; nothing was removed.
    Blocked(ImpactSummary),
}

pub fn table_name(kind: LocationKind) -> &'static str {
    match kind {
        LocationKind::Region => "regions",
        LocationKind::City => "cities",
        LocationKind::Barangay => "barangays",
        LocationKind::Location => "locations",
    }
}

/// Foreign-key column pointing at the parent, `None` for regions.
pub fn parent_column(kind: LocationKind) -> Option<&'static str> {
    match kind {
        LocationKind::Region => None,
        LocationKind::City => Some("region_id"),
        LocationKind::Barangay => Some("city_id"),
        LocationKind::Location => Some("barangay_id"),
    }
}

/// `WHERE` clause selecting every `descendant` row under the `target` row bound to `$1`.
///
/// Returns `None` when `descendant` cannot sit below `target`.
pub fn subtree_filter(target: LocationKind, descendant: LocationKind) -> Option<String> {
    if descendant <= target {
        return None;
    }
    let parent = descendant.parent()?;
    let column = parent_column(descendant)?;
    if parent == target {
        return Some(format!("{column} = $1"));
    }
    let inner = subtree_filter(target, parent)?;
    Some(format!(
        "{column} IN (SELECT id FROM {} WHERE {inner})",
        table_name(parent)
    ))
}

/// Provides reads and writes for regions, cities, barangays and locations.
pub struct LocationRepo;

impl LocationRepo {
    // -- Lists ---------------------------------------------------------------

    pub async fn list_regions(pool: &PgPool) -> Result<Vec<RegionRow>, sqlx::Error> {
        let query = format!("SELECT {REGION_COLUMNS} FROM regions ORDER BY name, id");
        sqlx::query_as::<_, RegionRow>(&query).fetch_all(pool).await
    }

    pub async fn list_cities(pool: &PgPool) -> Result<Vec<CityRow>, sqlx::Error> {
        let query = format!("SELECT {CITY_COLUMNS} FROM cities ORDER BY name, id");
        sqlx::query_as::<_, CityRow>(&query).fetch_all(pool).await
    }

    pub async fn list_barangays(pool: &PgPool) -> Result<Vec<BarangayRow>, sqlx::Error> {
        let query = format!("SELECT {BARANGAY_COLUMNS} FROM barangays ORDER BY name, id");
        sqlx::query_as::<_, BarangayRow>(&query).fetch_all(pool).await
    }

    pub async fn list_locations(pool: &PgPool) -> Result<Vec<LocationRow>, sqlx::Error> {
        let query = format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name, id");
        sqlx::query_as::<_, LocationRow>(&query).fetch_all(pool).await
    }

    // -- Writes --------------------------------------------------------------

    /// Insert a node and return its new id.
    pub async fn create(
        pool: &PgPool,
        kind: LocationKind,
        name: &str,
        parent_id: Option<DbId>,
    ) -> Result<DbId, sqlx::Error> {
        let table = table_name(kind);
        let row: (DbId,) = match parent_column(kind) {
            Some(column) => {
                let query =
                    format!("INSERT INTO {table} (name, {column}) VALUES ($1, $2) RETURNING id");
                sqlx::query_as(&query)
                    .bind(name)
                    .bind(parent_id)
                    .fetch_one(pool)
                    .await?
            }
            None => {
                let query = format!("INSERT INTO {table} (name) VALUES ($1) RETURNING id");
                sqlx::query_as(&query).bind(name).fetch_one(pool).await?
            }
        };
        Ok(row.0)
    }

    /// Rename and re-parent a node. Returns `false` if no row matched.
    pub async fn update(
        pool: &PgPool,
        node: NodeRef,
        name: &str,
        parent_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let table = table_name(node.kind);
        let result = match parent_column(node.kind) {
            Some(column) => {
                let query = format!(
                    "UPDATE {table} SET name = $2, {column} = $3, updated_at = NOW() WHERE id = $1"
                );
                sqlx::query(&query)
                    .bind(node.id)
                    .bind(name)
                    .bind(parent_id)
                    .execute(pool)
                    .await?
            }
            None => {
                let query =
                    format!("UPDATE {table} SET name = $2, updated_at = NOW() WHERE id = $1");
                sqlx::query(&query)
                    .bind(node.id)
                    .bind(name)
                    .execute(pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    // -- Deletes -------------------------------------------------------------

    /// Count everything below `node`, per kind.
    pub async fn impact(conn: &mut PgConnection, node: NodeRef) -> Result<ImpactSummary, sqlx::Error> {
        let mut counts = [0usize; 3];
        let below = [LocationKind::City, LocationKind::Barangay, LocationKind::Location];
        for (slot, kind) in counts.iter_mut().zip(below) {
            let Some(filter) = subtree_filter(node.kind, kind) else {
                continue;
            };
            let query = format!("SELECT COUNT(*) FROM {} WHERE {filter}", table_name(kind));
            let count: (i64,) = sqlx::query_as(&query)
                .bind(node.id)
                .fetch_one(&mut *conn)
                .await?;
            *slot = usize::try_from(count.0).unwrap_or_default();
        }
        let [cities, barangays, locations] = counts;
        Ok(ImpactSummary::from_counts(node.kind, cities, barangays, locations))
    }

    /// Delete a single node, refusing if anything still references it.
    pub async fn delete(pool: &PgPool, node: NodeRef) -> Result<DeleteOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let impact = Self::impact(&mut *tx, node).await?;
        if !impact.is_empty() {
            return Ok(DeleteOutcome::Blocked(impact));
        }

        let query = format!("DELETE FROM {} WHERE id = $1", table_name(node.kind));
        let result = sqlx::query(&query).bind(node.id).execute(&mut *tx).await?;
        tx.commit().await?;

        if result.rows_affected() > 0 {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    /// Delete a node and its whole subtree in one transaction, leaves first.
    pub async fn delete_cascade(pool: &PgPool, node: NodeRef) -> Result<DeleteOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        for kind in LocationKind::ALL.into_iter().rev() {
            let Some(filter) = subtree_filter(node.kind, kind) else {
                continue;
            };
            let query = format!("DELETE FROM {} WHERE {filter}", table_name(kind));
            let result = sqlx::query(&query).bind(node.id).execute(&mut *tx).await?;
            tracing::debug!(node = %node, kind = %kind, rows = result.rows_affected(), "Cascade step");
        }

        let query = format!("DELETE FROM {} WHERE id = $1", table_name(node.kind));
        let result = sqlx::query(&query).bind(node.id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(DeleteOutcome::NotFound);
        }

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }
}
