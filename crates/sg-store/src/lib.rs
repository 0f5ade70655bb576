//! Durable storage for the routing gateway.
//!
//! Two tables, both carrying a uniqueness constraint on the internal
//! reference: `routing_mappings` (reference -> upstream transaction id) and
//! `transactions` (the application's own coarse transfer record). The
//! constraints are enforced at the storage layer so that racing duplicate
//! writes collapse into a well-defined [`StoreError::DuplicateReference`]
//! instead of a second row.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tracing::info;

pub mod error;
mod routing;
mod transactions;

pub use error::{Result, StoreError};
pub use routing::RoutingStore;
pub use transactions::{NewTransactionRecord, TransactionRecord, TransactionStore};

pub type DbPool = Pool<Sqlite>;

/// Open a connection pool for the given sqlx URL.
pub async fn connect(url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Create the gateway schema.
///
/// Idempotent; safe to run at every process start.
pub async fn init_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS routing_mappings (
            internal_reference TEXT PRIMARY KEY,
            upstream_transaction_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            internal_reference TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            requested_amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            network TEXT NOT NULL,
            recipient_address TEXT NOT NULL,
            deposit_address TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            source_amount TEXT,
            destination_amount TEXT,
            settlement_hash TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_transactions_status
        ON transactions (status)
        "#,
    )
    .execute(pool)
    .await?;

    info!("Gateway storage schema initialized");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    // A single connection keeps every statement on the same in-memory
    // database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
