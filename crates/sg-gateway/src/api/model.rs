//! API request/response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sg_common::{QueueStats, TransferKind};

/// Body of `POST /api/transfers`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    /// Transfer kind; defaults to a plain transfer
    #[serde(default)]
    pub kind: TransferKind,
    pub recipient_address: String,
    /// Decimal string, e.g. "1.5"
    pub amount: String,
    pub currency: String,
    pub network: String,
}

/// Error body with a stable, user-safe message
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// UP or DEGRADED
    pub status: String,
    pub version: String,
    pub queue: QueueStats,
}

/// Kubernetes probe response
#[derive(Serialize, ToSchema)]
pub struct ProbeResponse {
    /// LIVE or READY
    pub status: String,
}
