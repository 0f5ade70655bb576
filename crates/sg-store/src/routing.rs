//! Routing mapping persistence.

use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use crate::{DbPool, Result, StoreError};

/// Durable mapping from internal reference to upstream transaction id,
/// visible to every gateway instance sharing the database.
#[derive(Clone)]
pub struct RoutingStore {
    pool: DbPool,
}

impl RoutingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record the mapping for a freshly created upstream transaction.
    ///
    /// Fails with [`StoreError::DuplicateReference`] if the reference is
    /// already mapped; the caller must treat that as "already created" and
    /// must not create a second upstream transaction for it.
    pub async fn put(&self, internal_reference: &str, upstream_transaction_id: &str) -> Result<()> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO routing_mappings
                (internal_reference, upstream_transaction_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(internal_reference)
        .bind(upstream_transaction_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, internal_reference))?;

        debug!(
            internal_reference = %internal_reference,
            "Routing mapping persisted"
        );
        Ok(())
    }

    /// Resolve the upstream transaction id for a reference.
    pub async fn get(&self, internal_reference: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT upstream_transaction_id FROM routing_mappings WHERE internal_reference = ?",
        )
        .bind(internal_reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("upstream_transaction_id")))
    }
}
