use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod logging;

// ============================================================================
// Transfer Vocabulary
// ============================================================================

/// Kind of transfer being routed through the upstream exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Transfer,
    Shield,
    Unshield,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Transfer => "transfer",
            TransferKind::Shield => "shield",
            TransferKind::Unshield => "unshield",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "transfer" => Some(TransferKind::Transfer),
            "shield" => Some(TransferKind::Shield),
            "unshield" => Some(TransferKind::Unshield),
            _ => None,
        }
    }
}

impl Default for TransferKind {
    fn default() -> Self {
        TransferKind::Transfer
    }
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The application's own coarse transfer status, distinct from the upstream
/// service's finer vocabulary.
///
/// Transitions are one-way: Pending -> Confirmed or Pending -> Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Confirmed => "confirmed",
            TransferStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "confirmed" => Some(TransferStatus::Confirmed),
            "failed" => Some(TransferStatus::Failed),
            _ => None,
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Confirmed | TransferStatus::Failed)
    }
}

impl Default for TransferStatus {
    fn default() -> Self {
        TransferStatus::Pending
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Upstream Status Vocabulary
// ============================================================================

/// Lifecycle vocabulary of the upstream exchange service, ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamTxStatus {
    Waiting,
    Confirming,
    Exchanging,
    Sending,
    Finished,
    Failed,
    Refunded,
    Expired,
}

impl UpstreamTxStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(UpstreamTxStatus::Waiting),
            "confirming" => Some(UpstreamTxStatus::Confirming),
            "exchanging" => Some(UpstreamTxStatus::Exchanging),
            "sending" => Some(UpstreamTxStatus::Sending),
            "finished" => Some(UpstreamTxStatus::Finished),
            "failed" => Some(UpstreamTxStatus::Failed),
            "refunded" => Some(UpstreamTxStatus::Refunded),
            "expired" => Some(UpstreamTxStatus::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamTxStatus::Waiting => "waiting",
            UpstreamTxStatus::Confirming => "confirming",
            UpstreamTxStatus::Exchanging => "exchanging",
            UpstreamTxStatus::Sending => "sending",
            UpstreamTxStatus::Finished => "finished",
            UpstreamTxStatus::Failed => "failed",
            UpstreamTxStatus::Refunded => "refunded",
            UpstreamTxStatus::Expired => "expired",
        }
    }

    /// Collapse the upstream vocabulary into the application's coarse status.
    pub fn normalize(&self) -> TransferStatus {
        match self {
            UpstreamTxStatus::Waiting
            | UpstreamTxStatus::Confirming
            | UpstreamTxStatus::Exchanging
            | UpstreamTxStatus::Sending => TransferStatus::Pending,
            UpstreamTxStatus::Finished => TransferStatus::Confirmed,
            UpstreamTxStatus::Failed
            | UpstreamTxStatus::Refunded
            | UpstreamTxStatus::Expired => TransferStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.normalize().is_terminal()
    }
}

impl std::fmt::Display for UpstreamTxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Public Request/Response Shapes
// ============================================================================

/// A validated transfer submission as accepted by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default)]
    pub kind: TransferKind,
    pub recipient_address: String,
    pub amount: String,
    pub currency: String,
    pub network: String,
}

/// The client-visible result of a routed transfer creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub internal_reference: String,
    pub deposit_address: String,
    pub requested_amount: String,
    pub currency: String,
    pub network: String,
}

/// Sanitized status projection served to untrusted callers.
///
/// Raw upstream identifiers and full settlement hashes are never exposed;
/// the hash fragment is only present once the transfer is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: TransferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_hash_fragment: Option<String>,
}

/// Number of leading characters of the settlement hash exposed to callers.
pub const SETTLEMENT_HASH_FRAGMENT_LEN: usize = 12;

impl StatusView {
    /// Pre-terminal view used before the upstream has indexed the transaction
    /// or while it is unreachable.
    pub fn waiting() -> Self {
        Self {
            status: TransferStatus::Pending,
            source_amount: None,
            destination_amount: None,
            settlement_hash_fragment: None,
        }
    }

    pub fn hash_fragment(hash: &str) -> String {
        hash.chars().take(SETTLEMENT_HASH_FRAGMENT_LEN).collect()
    }
}

// ============================================================================
// Queue Observability
// ============================================================================

/// Point-in-time statistics for the outbound request queue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Entries admitted but not yet dispatched.
    pub queued: u64,
    /// Calls currently running against the upstream.
    pub in_flight: u64,
    pub total_dispatched: u64,
    pub total_retried: u64,
    pub total_abandoned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_normalizes_by_progress() {
        assert_eq!(UpstreamTxStatus::Waiting.normalize(), TransferStatus::Pending);
        assert_eq!(UpstreamTxStatus::Confirming.normalize(), TransferStatus::Pending);
        assert_eq!(UpstreamTxStatus::Exchanging.normalize(), TransferStatus::Pending);
        assert_eq!(UpstreamTxStatus::Sending.normalize(), TransferStatus::Pending);
        assert_eq!(UpstreamTxStatus::Finished.normalize(), TransferStatus::Confirmed);
        assert_eq!(UpstreamTxStatus::Failed.normalize(), TransferStatus::Failed);
        assert_eq!(UpstreamTxStatus::Refunded.normalize(), TransferStatus::Failed);
        assert_eq!(UpstreamTxStatus::Expired.normalize(), TransferStatus::Failed);
    }

    #[test]
    fn unknown_upstream_status_is_rejected() {
        assert!(UpstreamTxStatus::from_str("settling").is_none());
        assert!(UpstreamTxStatus::from_str("FINISHED").is_none());
    }

    #[test]
    fn terminal_statuses_are_terminal() {
        assert!(!TransferStatus::Pending.is_terminal());
        assert!(TransferStatus::Confirmed.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
    }

    #[test]
    fn hash_fragment_truncates() {
        let fragment = StatusView::hash_fragment("a1b2c3d4e5f6a7b8c9d0");
        assert_eq!(fragment, "a1b2c3d4e5f6");
        assert_eq!(StatusView::hash_fragment("abc"), "abc");
    }
}
