//! Transaction record persistence.

use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use sg_common::{TransferKind, TransferStatus};

use crate::{DbPool, Result, StoreError};

/// A persisted transfer record.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: String,
    pub internal_reference: String,
    pub kind: TransferKind,
    pub requested_amount: String,
    pub currency: String,
    pub network: String,
    pub recipient_address: String,
    pub deposit_address: String,
    pub status: TransferStatus,
    pub error_message: Option<String>,
    /// Terminal snapshot, written once by the status monitor
    pub source_amount: Option<String>,
    pub destination_amount: Option<String>,
    pub settlement_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields supplied when a transfer is first recorded.
#[derive(Debug, Clone)]
pub struct NewTransactionRecord {
    pub internal_reference: String,
    pub kind: TransferKind,
    pub requested_amount: String,
    pub currency: String,
    pub network: String,
    pub recipient_address: String,
    pub deposit_address: String,
}

/// Repository for transfer records.
///
/// Records are created pending and mutated exactly once, when a terminal
/// upstream status is observed; the guarded UPDATE in [`finalize`] makes the
/// pending -> terminal transition one-way at the storage layer.
///
/// [`finalize`]: TransactionStore::finalize
#[derive(Clone)]
pub struct TransactionStore {
    pool: DbPool,
}

impl TransactionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a fresh pending record.
    ///
    /// The UNIQUE constraint on `internal_reference` converts duplicate
    /// inserts into [`StoreError::DuplicateReference`].
    pub async fn insert(&self, new: NewTransactionRecord) -> Result<TransactionRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, internal_reference, kind, requested_amount, currency, network,
                 recipient_address, deposit_address, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.internal_reference)
        .bind(new.kind.as_str())
        .bind(&new.requested_amount)
        .bind(&new.currency)
        .bind(&new.network)
        .bind(&new.recipient_address)
        .bind(&new.deposit_address)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, &new.internal_reference))?;

        debug!(
            internal_reference = %new.internal_reference,
            kind = %new.kind,
            "Transaction record created"
        );

        Ok(TransactionRecord {
            id,
            internal_reference: new.internal_reference,
            kind: new.kind,
            requested_amount: new.requested_amount,
            currency: new.currency,
            network: new.network,
            recipient_address: new.recipient_address,
            deposit_address: new.deposit_address,
            status: TransferStatus::Pending,
            error_message: None,
            source_amount: None,
            destination_amount: None,
            settlement_hash: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_by_reference(
        &self,
        internal_reference: &str,
    ) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query("SELECT * FROM transactions WHERE internal_reference = ?")
            .bind(internal_reference)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            let kind: String = r.get("kind");
            let status: String = r.get("status");
            TransactionRecord {
                id: r.get("id"),
                internal_reference: r.get("internal_reference"),
                kind: TransferKind::from_str(&kind).unwrap_or_default(),
                requested_amount: r.get("requested_amount"),
                currency: r.get("currency"),
                network: r.get("network"),
                recipient_address: r.get("recipient_address"),
                deposit_address: r.get("deposit_address"),
                status: TransferStatus::from_str(&status).unwrap_or_default(),
                error_message: r.get("error_message"),
                source_amount: r.get("source_amount"),
                destination_amount: r.get("destination_amount"),
                settlement_hash: r.get("settlement_hash"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            }
        }))
    }

    /// Write the terminal outcome for a pending record.
    ///
    /// Returns true if this call performed the transition, false if the
    /// record was already terminal (or does not exist). The
    /// `status = 'pending'` guard is what makes terminal statuses
    /// unrevertable regardless of caller interleaving.
    pub async fn finalize(
        &self,
        internal_reference: &str,
        status: TransferStatus,
        source_amount: Option<&str>,
        destination_amount: Option<&str>,
        settlement_hash: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<bool> {
        debug_assert!(status.is_terminal());

        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?, source_amount = ?, destination_amount = ?,
                settlement_hash = ?, error_message = ?, updated_at = ?
            WHERE internal_reference = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(source_amount)
        .bind(destination_amount)
        .bind(settlement_hash)
        .bind(error_message)
        .bind(now)
        .bind(internal_reference)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            debug!(
                internal_reference = %internal_reference,
                status = %status,
                "Transaction record finalized"
            );
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    fn new_record(reference: &str) -> NewTransactionRecord {
        NewTransactionRecord {
            internal_reference: reference.to_string(),
            kind: TransferKind::Transfer,
            requested_amount: "1.5".to_string(),
            currency: "sol".to_string(),
            network: "sol".to_string(),
            recipient_address: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string(),
            deposit_address: "2q7pyhPwAwZ3QMfZrnAbDhnh9mDUqycszcpf86VgQxhF".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let store = TransactionStore::new(test_pool().await);

        let created = store.insert(new_record("ref-1")).await.unwrap();
        assert_eq!(created.status, TransferStatus::Pending);

        let found = store.find_by_reference("ref-1").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.requested_amount, "1.5");
        assert_eq!(found.status, TransferStatus::Pending);
        assert!(found.settlement_hash.is_none());
    }

    #[tokio::test]
    async fn duplicate_reference_is_rejected() {
        let store = TransactionStore::new(test_pool().await);

        store.insert(new_record("ref-dup")).await.unwrap();
        let err = store.insert(new_record("ref-dup")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateReference(_)));
    }

    #[tokio::test]
    async fn finalize_is_one_way_and_exactly_once() {
        let store = TransactionStore::new(test_pool().await);
        store.insert(new_record("ref-done")).await.unwrap();

        let first = store
            .finalize(
                "ref-done",
                TransferStatus::Confirmed,
                Some("1.5"),
                Some("1.49"),
                Some("abcdef0123456789"),
                None,
            )
            .await
            .unwrap();
        assert!(first);

        // A second terminal observation must not change anything
        let second = store
            .finalize("ref-done", TransferStatus::Failed, None, None, None, Some("late"))
            .await
            .unwrap();
        assert!(!second);

        let record = store.find_by_reference("ref-done").await.unwrap().unwrap();
        assert_eq!(record.status, TransferStatus::Confirmed);
        assert_eq!(record.destination_amount.as_deref(), Some("1.49"));
        assert!(record.error_message.is_none());
    }

    #[tokio::test]
    async fn finalize_unknown_reference_is_noop() {
        let store = TransactionStore::new(test_pool().await);
        let updated = store
            .finalize("missing", TransferStatus::Failed, None, None, None, None)
            .await
            .unwrap();
        assert!(!updated);
    }
}
