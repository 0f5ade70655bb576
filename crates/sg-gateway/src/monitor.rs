//! Status monitor - normalizes upstream progress into the stable vocabulary
//!
//! Status lookups go through the outbound queue at elevated priority so that
//! users watching a transfer are not starved behind new submissions. The
//! monitor never surfaces upstream hiccups: a not-yet-indexed transaction or
//! a transient failure reads as "waiting". Terminal outcomes are persisted
//! exactly once and served locally from then on.

use std::sync::Arc;
use tracing::{debug, info, warn};

use sg_common::{StatusView, TransferStatus, UpstreamTxStatus};
use sg_store::{RoutingStore, TransactionRecord, TransactionStore};
use sg_upstream::{TransactionStatus, UpstreamError};

use crate::queue::{OutboundCall, OutboundQueue, UpstreamReply};
use crate::Result;

pub struct StatusMonitor {
    queue: Arc<OutboundQueue>,
    routing: RoutingStore,
    transactions: TransactionStore,
}

impl StatusMonitor {
    pub fn new(
        queue: Arc<OutboundQueue>,
        routing: RoutingStore,
        transactions: TransactionStore,
    ) -> Self {
        Self {
            queue,
            routing,
            transactions,
        }
    }

    /// Resolve the current status for an internal reference.
    ///
    /// Unknown references and upstream failures read as a pending/"waiting"
    /// view; only storage failures propagate as errors.
    pub async fn poll(&self, reference: &str) -> Result<StatusView> {
        let record = self.transactions.find_by_reference(reference).await?;

        // Terminal state never reverts; short-circuit from the local row
        // without consuming upstream rate budget.
        if let Some(record) = record.as_ref().filter(|r| r.status.is_terminal()) {
            return Ok(view_from_record(record));
        }

        let Some(upstream_id) = self.routing.get(reference).await? else {
            debug!(reference = %reference, "No routing mapping for reference, reporting waiting");
            return Ok(StatusView::waiting());
        };

        let status = match self.queue.enqueue(OutboundCall::Status { upstream_id }).await {
            Ok(UpstreamReply::Status(status)) => status,
            Ok(UpstreamReply::Created(_)) => return Ok(StatusView::waiting()),
            Err(UpstreamError::NotFound) => {
                // Propagation delay between creation and upstream indexing
                debug!(reference = %reference, "Upstream has not indexed the transaction yet");
                return Ok(StatusView::waiting());
            }
            Err(err) => {
                warn!(
                    reference = %reference,
                    error = %err,
                    "Status lookup failed, reporting waiting"
                );
                return Ok(StatusView::waiting());
            }
        };

        let normalized = status.status.normalize();
        if normalized.is_terminal() {
            let error_message = match status.status {
                UpstreamTxStatus::Finished => None,
                other => Some(format!("upstream reported {other}")),
            };
            let updated = self
                .transactions
                .finalize(
                    reference,
                    normalized,
                    status.from_amount.as_deref(),
                    status.to_amount.as_deref(),
                    status.payout_hash.as_deref(),
                    error_message.as_deref(),
                )
                .await?;
            if updated {
                info!(
                    reference = %reference,
                    status = %normalized,
                    upstream_status = %status.status,
                    "Transfer reached terminal status"
                );
            }
        }

        Ok(view_from_upstream(normalized, &status))
    }
}

fn view_from_record(record: &TransactionRecord) -> StatusView {
    StatusView {
        status: record.status,
        source_amount: record.source_amount.clone(),
        destination_amount: record.destination_amount.clone(),
        settlement_hash_fragment: record
            .settlement_hash
            .as_deref()
            .map(StatusView::hash_fragment),
    }
}

fn view_from_upstream(normalized: TransferStatus, status: &TransactionStatus) -> StatusView {
    StatusView {
        status: normalized,
        source_amount: status.from_amount.clone(),
        destination_amount: status.to_amount.clone(),
        // The hash fragment is only exposed once the transfer is terminal
        settlement_hash_fragment: if normalized.is_terminal() {
            status.payout_hash.as_deref().map(StatusView::hash_fragment)
        } else {
            None
        },
    }
}
