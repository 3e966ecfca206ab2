//! [`RecordStore`] backed by PostgreSQL.

use isp_core::hierarchy::{
    Barangay, City, ConflictInfo, Location, LocationKind, NodeInput, NodeRef, RecordStore, Region,
    StoreError,
};
use isp_core::types::DbId;

use crate::repositories::{DeleteOutcome, LocationRepo};
use crate::DbPool;

/// PostgreSQL error code for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}

/// Map a failed insert/update: a dangling parent reference becomes `NotFound(parent)`.
fn write_error(kind: LocationKind, parent_id: Option<DbId>, err: sqlx::Error) -> StoreError {
    match (kind.parent(), parent_id) {
        (Some(parent_kind), Some(id)) if is_foreign_key_violation(&err) => {
            StoreError::NotFound(NodeRef::new(parent_kind, id))
        }
        _ => {
            tracing::error!(kind = %kind, error = %err, "Location write failed");
            StoreError::backend(err)
        }
    }
}

fn outcome(node: NodeRef, result: DeleteOutcome) -> Result<(), StoreError> {
    match result {
        DeleteOutcome::Deleted => Ok(()),
        DeleteOutcome::NotFound => Err(StoreError::NotFound(node)),
        DeleteOutcome::Blocked(impact) => Err(StoreError::Conflict(ConflictInfo { node, impact })),
    }
}

impl RecordStore for PgRecordStore {
    async fn list_regions(&self) -> Result<Vec<Region>, StoreError> {
        let rows = LocationRepo::list_regions(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(rows.into_iter().map(Region::from).collect())
    }

    async fn list_cities(&self) -> Result<Vec<City>, StoreError> {
        let rows = LocationRepo::list_cities(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(rows.into_iter().map(City::from).collect())
    }

    async fn list_barangays(&self) -> Result<Vec<Barangay>, StoreError> {
        let rows = LocationRepo::list_barangays(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(rows.into_iter().map(Barangay::from).collect())
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let rows = LocationRepo::list_locations(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    async fn delete(&self, node: NodeRef, cascade: bool) -> Result<(), StoreError> {
        let result = if cascade {
            LocationRepo::delete_cascade(&self.pool, node).await
        } else {
            LocationRepo::delete(&self.pool, node).await
        };

        match result {
            Ok(result) => outcome(node, result),
            // A child was inserted between the count and the delete.
            Err(err) if is_foreign_key_violation(&err) => {
                let mut conn = self.pool.acquire().await.map_err(StoreError::backend)?;
                let impact = LocationRepo::impact(&mut *conn, node)
                    .await
                    .map_err(StoreError::backend)?;
                Err(StoreError::Conflict(ConflictInfo { node, impact }))
            }
            Err(err) => {
                tracing::error!(node = %node, cascade, error = %err, "Location delete failed");
                Err(StoreError::backend(err))
            }
        }
    }

    async fn create(&self, kind: LocationKind, input: NodeInput) -> Result<DbId, StoreError> {
        LocationRepo::create(&self.pool, kind, &input.name, input.parent_id)
            .await
            .map_err(|err| write_error(kind, input.parent_id, err))
    }

    async fn update(&self, node: NodeRef, input: NodeInput) -> Result<(), StoreError> {
        let updated = LocationRepo::update(&self.pool, node, &input.name, input.parent_id)
            .await
            .map_err(|err| write_error(node.kind, input.parent_id, err))?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound(node))
        }
    }
}
