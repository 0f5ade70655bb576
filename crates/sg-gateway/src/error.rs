use thiserror::Error;

use sg_store::StoreError;
use sg_upstream::UpstreamError;

/// Request validation failures. Surfaced to the caller immediately; no
/// upstream call is made.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported currency/network pair: {currency}/{network}")]
    UnsupportedAsset { currency: String, network: String },

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Amount below minimum of {minimum}")]
    AmountBelowMinimum { minimum: String },

    #[error("Invalid address format for network {network}")]
    InvalidAddress { network: String },
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The upstream create response did not survive cross-validation
    /// (payout address mismatch, or a deposit address outside the requested
    /// network's address family). Nothing is persisted.
    #[error("Upstream response failed integrity checks: {0}")]
    ResponseIntegrity(&'static str),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
