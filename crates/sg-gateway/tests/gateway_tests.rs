//! Coordinator and status monitor integration tests
//!
//! Exercises the full path (validation -> queue -> upstream -> persistence
//! -> status normalization) against a scripted exchange client and a real
//! embedded store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sg_common::{TransferKind, TransferRequest, TransferStatus, UpstreamTxStatus};
use sg_gateway::{
    AssetRule, GatewayError, OutboundQueue, OutboundQueueConfig, StatusMonitor,
    TransferCoordinator, TransferPolicy, ValidationError,
};
use sg_store::{DbPool, RoutingStore, TransactionStore};
use sg_upstream::{
    CreateTransactionRequest, CreatedTransaction, ExchangeClient, TransactionStatus, UpstreamError,
};

const SOL_RECIPIENT: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
const SOL_PAYIN: &str = "2q7pyhPwAwZ3QMfZrnAbDhnh9mDUqycszcpf86VgQxhF";
const PAYOUT_HASH: &str = "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnb";

/// Exchange client with scripted status responses.
struct ScriptedExchange {
    payin_address: String,
    /// When set, the create response pays out somewhere else than requested
    payout_override: Option<String>,
    create_calls: AtomicU32,
    status_calls: AtomicU32,
    statuses: Mutex<VecDeque<Result<TransactionStatus, UpstreamError>>>,
}

impl ScriptedExchange {
    fn new() -> Self {
        Self {
            payin_address: SOL_PAYIN.to_string(),
            payout_override: None,
            create_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            statuses: Mutex::new(VecDeque::new()),
        }
    }

    fn with_payin(payin: &str) -> Self {
        Self {
            payin_address: payin.to_string(),
            ..Self::new()
        }
    }

    fn with_payout_override(payout: &str) -> Self {
        Self {
            payout_override: Some(payout.to_string()),
            ..Self::new()
        }
    }

    fn push_status(&self, status: Result<TransactionStatus, UpstreamError>) {
        self.statuses.lock().push_back(status);
    }

    fn create_call_count(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn status_call_count(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

fn upstream_status(status: UpstreamTxStatus, payout_hash: Option<&str>) -> TransactionStatus {
    TransactionStatus {
        status,
        from_amount: Some("1.5".to_string()),
        to_amount: Some("1.49".to_string()),
        payout_hash: payout_hash.map(|h| h.to_string()),
        created_at: None,
        updated_at: None,
    }
}

#[async_trait]
impl ExchangeClient for ScriptedExchange {
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreatedTransaction, UpstreamError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedTransaction {
            id: "up-1".to_string(),
            payin_address: self.payin_address.clone(),
            payout_address: self
                .payout_override
                .clone()
                .unwrap_or_else(|| request.address.clone()),
            from_amount: request.from_amount.clone(),
            to_amount: "1.49".to_string(),
        })
    }

    async fn transaction_status(
        &self,
        _upstream_id: &str,
    ) -> Result<TransactionStatus, UpstreamError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(upstream_status(UpstreamTxStatus::Waiting, None)))
    }
}

struct Stack {
    coordinator: TransferCoordinator,
    monitor: StatusMonitor,
    transactions: TransactionStore,
    routing: RoutingStore,
    pool: DbPool,
}

async fn stack(exchange: Arc<ScriptedExchange>) -> Stack {
    let pool = sg_store::connect("sqlite::memory:", 1).await.unwrap();
    sg_store::init_schema(&pool).await.unwrap();

    let routing = RoutingStore::new(pool.clone());
    let transactions = TransactionStore::new(pool.clone());

    let queue = OutboundQueue::start(
        OutboundQueueConfig {
            max_requests_per_second: 1000.0,
            headroom: 1.0,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(10),
        },
        exchange,
    );

    let policy = TransferPolicy::new(vec![AssetRule::new("sol", "sol", "0.1").unwrap()]);

    Stack {
        coordinator: TransferCoordinator::new(
            queue.clone(),
            routing.clone(),
            transactions.clone(),
            policy,
        ),
        monitor: StatusMonitor::new(queue, routing.clone(), transactions.clone()),
        transactions,
        routing,
        pool,
    }
}

fn sol_request(amount: &str) -> TransferRequest {
    TransferRequest {
        kind: TransferKind::Transfer,
        recipient_address: SOL_RECIPIENT.to_string(),
        amount: amount.to_string(),
        currency: "sol".to_string(),
        network: "sol".to_string(),
    }
}

async fn table_counts(pool: &DbPool) -> (i64, i64) {
    use sqlx::Row;
    let mappings: i64 = sqlx::query("SELECT COUNT(*) AS c FROM routing_mappings")
        .fetch_one(pool)
        .await
        .unwrap()
        .get("c");
    let transactions: i64 = sqlx::query("SELECT COUNT(*) AS c FROM transactions")
        .fetch_one(pool)
        .await
        .unwrap()
        .get("c");
    (mappings, transactions)
}

#[tokio::test]
async fn transfer_lifecycle_end_to_end() {
    let exchange = Arc::new(ScriptedExchange::new());
    exchange.push_status(Ok(upstream_status(UpstreamTxStatus::Exchanging, None)));
    exchange.push_status(Ok(upstream_status(
        UpstreamTxStatus::Finished,
        Some(PAYOUT_HASH),
    )));
    let stack = stack(exchange.clone()).await;

    // Create
    let receipt = stack.coordinator.submit(sol_request("1.5")).await.unwrap();
    assert_eq!(receipt.internal_reference.len(), 24);
    assert_eq!(receipt.deposit_address, SOL_PAYIN);
    assert_eq!(receipt.requested_amount, "1.5");

    // The mapping resolves to the upstream id
    assert_eq!(
        stack.routing.get(&receipt.internal_reference).await.unwrap(),
        Some("up-1".to_string())
    );

    // First poll: still in progress
    let view = stack.monitor.poll(&receipt.internal_reference).await.unwrap();
    assert_eq!(view.status, TransferStatus::Pending);
    assert!(view.settlement_hash_fragment.is_none());

    // Second poll: upstream reports finished
    let view = stack.monitor.poll(&receipt.internal_reference).await.unwrap();
    assert_eq!(view.status, TransferStatus::Confirmed);
    assert_eq!(view.source_amount.as_deref(), Some("1.5"));
    assert_eq!(view.destination_amount.as_deref(), Some("1.49"));
    assert_eq!(view.settlement_hash_fragment.as_deref(), Some("5VERv8NMvzbJ"));

    // The record was finalized with the terminal snapshot
    let record = stack
        .transactions
        .find_by_reference(&receipt.internal_reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TransferStatus::Confirmed);
    assert_eq!(record.settlement_hash.as_deref(), Some(PAYOUT_HASH));
    assert!(record.error_message.is_none());

    // Terminal polls short-circuit without touching the upstream
    let upstream_calls = exchange.status_call_count();
    let view = stack.monitor.poll(&receipt.internal_reference).await.unwrap();
    assert_eq!(view.status, TransferStatus::Confirmed);
    assert_eq!(view.settlement_hash_fragment.as_deref(), Some("5VERv8NMvzbJ"));
    assert_eq!(exchange.status_call_count(), upstream_calls);
}

#[tokio::test]
async fn failed_upstream_status_finalizes_as_failed() {
    let exchange = Arc::new(ScriptedExchange::new());
    exchange.push_status(Ok(upstream_status(UpstreamTxStatus::Refunded, None)));
    let stack = stack(exchange).await;

    let receipt = stack.coordinator.submit(sol_request("1.5")).await.unwrap();
    let view = stack.monitor.poll(&receipt.internal_reference).await.unwrap();
    assert_eq!(view.status, TransferStatus::Failed);

    let record = stack
        .transactions
        .find_by_reference(&receipt.internal_reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TransferStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("upstream reported refunded"));
}

#[tokio::test]
async fn payout_mismatch_fails_and_persists_nothing() {
    let exchange = Arc::new(ScriptedExchange::with_payout_override(
        "3N8kq7zeTDJN66tjnLCzXHJiHZ3PHLd2dcRe2snpbUqa",
    ));
    let stack = stack(exchange).await;

    let err = stack.coordinator.submit(sol_request("1.5")).await.unwrap_err();
    assert!(matches!(err, GatewayError::ResponseIntegrity(_)));

    assert_eq!(table_counts(&stack.pool).await, (0, 0));
}

#[tokio::test]
async fn foreign_deposit_address_family_fails_and_persists_nothing() {
    // An EVM-style deposit address for a Solana transfer
    let exchange = Arc::new(ScriptedExchange::with_payin(
        "0x52908400098527886E0F7030069857D2E4169EE7",
    ));
    let stack = stack(exchange).await;

    let err = stack.coordinator.submit(sol_request("1.5")).await.unwrap_err();
    assert!(matches!(err, GatewayError::ResponseIntegrity(_)));

    assert_eq!(table_counts(&stack.pool).await, (0, 0));
}

#[tokio::test]
async fn validation_failures_never_reach_the_upstream() {
    let exchange = Arc::new(ScriptedExchange::new());
    let stack = stack(exchange.clone()).await;

    let mut request = sol_request("1.5");
    request.recipient_address = "not-an-address".to_string();
    let err = stack.coordinator.submit(request).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Validation(ValidationError::InvalidAddress { .. })
    ));

    let err = stack.coordinator.submit(sol_request("0.01")).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Validation(ValidationError::AmountBelowMinimum { .. })
    ));

    assert_eq!(exchange.create_call_count(), 0);
    assert_eq!(table_counts(&stack.pool).await, (0, 0));
}

#[tokio::test]
async fn unknown_reference_reads_as_waiting() {
    let exchange = Arc::new(ScriptedExchange::new());
    let stack = stack(exchange.clone()).await;

    let view = stack.monitor.poll("non-existent-reference").await.unwrap();
    assert_eq!(view.status, TransferStatus::Pending);
    assert!(view.source_amount.is_none());

    // No upstream budget is spent on unmapped references
    assert_eq!(exchange.status_call_count(), 0);
}

#[tokio::test]
async fn not_yet_indexed_reads_as_waiting() {
    let exchange = Arc::new(ScriptedExchange::new());
    exchange.push_status(Err(UpstreamError::NotFound));
    let stack = stack(exchange).await;

    // Mapping exists, but the upstream has not indexed the transaction yet
    stack.routing.put("ref-fresh", "up-fresh").await.unwrap();

    let view = stack.monitor.poll("ref-fresh").await.unwrap();
    assert_eq!(view.status, TransferStatus::Pending);
}

#[tokio::test]
async fn transient_status_failure_reads_as_waiting() {
    let exchange = Arc::new(ScriptedExchange::new());
    // Transient errors exhaust the queue's attempt cap before surfacing
    for _ in 0..3 {
        exchange.push_status(Err(UpstreamError::Server { status: 503 }));
    }
    let stack = stack(exchange).await;

    stack.routing.put("ref-flaky", "up-flaky").await.unwrap();

    let view = stack.monitor.poll("ref-flaky").await.unwrap();
    assert_eq!(view.status, TransferStatus::Pending);
}

#[tokio::test]
async fn transfer_kind_is_recorded() {
    let exchange = Arc::new(ScriptedExchange::new());
    let stack = stack(exchange).await;

    let mut request = sol_request("1.5");
    request.kind = TransferKind::Shield;
    let receipt = stack.coordinator.submit(request).await.unwrap();

    let record = stack
        .transactions
        .find_by_reference(&receipt.internal_reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.kind, TransferKind::Shield);
    assert_eq!(record.status, TransferStatus::Pending);
}

#[tokio::test]
async fn explicit_confirmation_is_terminal_and_idempotent() {
    let exchange = Arc::new(ScriptedExchange::new());
    let stack = stack(exchange.clone()).await;

    let receipt = stack.coordinator.submit(sol_request("1.5")).await.unwrap();

    assert!(stack.coordinator.confirm(&receipt.internal_reference).await.unwrap());
    assert!(!stack.coordinator.confirm(&receipt.internal_reference).await.unwrap());

    // Confirmed records are served locally
    let upstream_calls = exchange.status_call_count();
    let view = stack.monitor.poll(&receipt.internal_reference).await.unwrap();
    assert_eq!(view.status, TransferStatus::Confirmed);
    assert_eq!(exchange.status_call_count(), upstream_calls);
}
