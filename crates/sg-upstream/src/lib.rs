//! Client for the upstream exchange service.
//!
//! The upstream performs the actual asset movement and is the single source
//! of truth for transfer progress. Its responses are ad-hoc JSON, so every
//! consumed field is validated for presence and type before use; a missing
//! or mistyped field fails the call as [`UpstreamError::Malformed`] instead
//! of propagating into persisted state.

use async_trait::async_trait;

pub mod error;
mod http;

pub use error::{Result, UpstreamError};
pub use http::{HttpExchangeClient, HttpExchangeConfig};

use sg_common::UpstreamTxStatus;

/// Parameters for creating an upstream transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub from_network: String,
    pub to_network: String,
    pub from_amount: String,
    /// Destination (payout) address the upstream must send funds to
    pub address: String,
}

/// Validated create response.
#[derive(Debug, Clone)]
pub struct CreatedTransaction {
    pub id: String,
    /// Deposit address the user must pay into
    pub payin_address: String,
    /// Address the upstream will pay out to; must equal the requested
    /// recipient (checked by the coordinator before anything is persisted)
    pub payout_address: String,
    pub from_amount: String,
    pub to_amount: String,
}

/// Validated status response.
#[derive(Debug, Clone)]
pub struct TransactionStatus {
    pub status: UpstreamTxStatus,
    pub from_amount: Option<String>,
    pub to_amount: Option<String>,
    pub payout_hash: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// The upstream exchange API surface consumed by the gateway.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreatedTransaction>;

    async fn transaction_status(&self, upstream_id: &str) -> Result<TransactionStatus>;
}
