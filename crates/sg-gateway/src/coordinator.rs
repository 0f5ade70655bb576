//! Transaction coordinator - the orchestration path for a single transfer
//!
//! Validating -> Submitting -> Routed -> (Confirmed | Failed). Validation
//! never touches the upstream; the create call goes through the outbound
//! queue at normal priority; the create response is cross-validated before
//! anything is trusted or persisted.

use rand::RngCore;
use std::sync::Arc;
use tracing::{error, info, warn};

use sg_common::{TransferReceipt, TransferRequest, TransferStatus};
use sg_store::{NewTransactionRecord, RoutingStore, TransactionStore};
use sg_upstream::CreateTransactionRequest;

use crate::policy::TransferPolicy;
use crate::queue::{OutboundCall, OutboundQueue, UpstreamReply};
use crate::{GatewayError, Result};

/// Bytes of entropy in an internal reference (hex-encoded to 24 chars)
const REFERENCE_BYTES: usize = 12;

/// Orchestrates transfer creation and persistence.
///
/// Duplicate submissions are not deduplicated by content: a client that
/// submits the same logical transfer twice gets two references and two real
/// upstream transactions. What the coordinator does guarantee, through the
/// storage-layer uniqueness constraints, is that a single internal reference
/// can never be associated with more than one upstream transaction.
pub struct TransferCoordinator {
    queue: Arc<OutboundQueue>,
    routing: RoutingStore,
    transactions: TransactionStore,
    policy: TransferPolicy,
}

impl TransferCoordinator {
    pub fn new(
        queue: Arc<OutboundQueue>,
        routing: RoutingStore,
        transactions: TransactionStore,
        policy: TransferPolicy,
    ) -> Self {
        Self {
            queue,
            routing,
            transactions,
            policy,
        }
    }

    /// Generate a fresh internal reference: unguessable and non-sequential.
    fn new_reference() -> String {
        let mut bytes = [0u8; REFERENCE_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Route a transfer through the upstream exchange.
    pub async fn submit(&self, request: TransferRequest) -> Result<TransferReceipt> {
        // Validating
        self.policy.validate(&request)?;

        // Submitting
        let reference = Self::new_reference();
        let create = CreateTransactionRequest {
            from_currency: request.currency.clone(),
            to_currency: request.currency.clone(),
            from_network: request.network.clone(),
            to_network: request.network.clone(),
            from_amount: request.amount.clone(),
            address: request.recipient_address.clone(),
        };

        let reply = self.queue.enqueue(OutboundCall::Create(create)).await?;
        let created = match reply {
            UpstreamReply::Created(created) => created,
            UpstreamReply::Status(_) => {
                return Err(GatewayError::Upstream(sg_upstream::UpstreamError::Malformed(
                    "status reply to a create call".to_string(),
                )))
            }
        };

        // Routed: cross-validate before trusting the response. A tampered or
        // buggy upstream must not be able to silently redirect funds.
        if created.payout_address != request.recipient_address {
            warn!(
                reference = %reference,
                "Upstream payout address does not match the requested recipient"
            );
            return Err(GatewayError::ResponseIntegrity(
                "payout address does not match the requested recipient",
            ));
        }
        if !self
            .policy
            .address_matches_network(&request.network, &created.payin_address)
        {
            warn!(
                reference = %reference,
                network = %request.network,
                "Upstream deposit address does not match the requested network"
            );
            return Err(GatewayError::ResponseIntegrity(
                "deposit address does not match the requested network",
            ));
        }

        // Mapping first: its uniqueness constraint is the idempotency guard.
        self.routing.put(&reference, &created.id).await?;

        let record = NewTransactionRecord {
            internal_reference: reference.clone(),
            kind: request.kind,
            requested_amount: request.amount.clone(),
            currency: request.currency.clone(),
            network: request.network.clone(),
            recipient_address: request.recipient_address,
            deposit_address: created.payin_address.clone(),
        };
        if let Err(err) = self.transactions.insert(record).await {
            // The mapping is sufficient to resume status tracking later, so
            // the client response stays successful.
            error!(
                reference = %reference,
                error = %err,
                "Transaction record write failed after routing mapping was persisted"
            );
        }

        info!(
            reference = %reference,
            currency = %request.currency,
            network = %request.network,
            kind = %request.kind,
            "Transfer routed"
        );

        Ok(TransferReceipt {
            internal_reference: reference,
            deposit_address: created.payin_address,
            requested_amount: request.amount,
            currency: request.currency,
            network: request.network,
        })
    }

    /// Explicit confirmation path. Returns false if the record was already
    /// terminal (or unknown).
    pub async fn confirm(&self, reference: &str) -> Result<bool> {
        let updated = self
            .transactions
            .finalize(reference, TransferStatus::Confirmed, None, None, None, None)
            .await?;
        if updated {
            info!(reference = %reference, "Transfer explicitly confirmed");
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_unique_and_opaque() {
        let a = TransferCoordinator::new_reference();
        let b = TransferCoordinator::new_reference();
        assert_eq!(a.len(), REFERENCE_BYTES * 2);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
