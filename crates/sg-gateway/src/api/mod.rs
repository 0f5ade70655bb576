//! Swapgate HTTP API
//!
//! Public endpoints:
//! - Transfer creation (strict inbound limit)
//! - Status lookup (general inbound limit)
//! - Health and Kubernetes probes
//! - Prometheus-style metrics exposition

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::OpenApi;

use sg_common::{QueueStats, StatusView, TransferReceipt, TransferRequest};
use sg_upstream::UpstreamError;

use crate::limiter::{InboundRateLimiter, RateLimited};
use crate::queue::OutboundQueue;
use crate::{GatewayError, StatusMonitor, TransferCoordinator};

pub mod model;

use model::{CreateTransferRequest, ErrorResponse, HealthResponse, ProbeResponse};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<TransferCoordinator>,
    pub monitor: Arc<StatusMonitor>,
    pub queue: Arc<OutboundQueue>,
    pub general_limiter: Arc<InboundRateLimiter>,
    pub create_limiter: Arc<InboundRateLimiter>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Swapgate Transaction Routing Gateway API",
        version = "0.1.0",
        description = "Routes transfers through a rate-limited upstream exchange and serves normalized status"
    ),
    paths(
        create_transfer,
        transfer_status,
        health_handler,
        liveness_probe,
        readiness_probe,
        metrics_handler,
    ),
    components(schemas(
        CreateTransferRequest,
        ErrorResponse,
        HealthResponse,
        ProbeResponse,
        TransferReceipt,
        StatusView,
        QueueStats,
    )),
    tags(
        (name = "transfers", description = "Transfer creation and status"),
        (name = "health", description = "Health check endpoints"),
        (name = "monitoring", description = "Metrics endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the full router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api-doc/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_handler))
        .route("/api/transfers", post(create_transfer))
        .route("/api/transfers/{reference}/status", get(transfer_status))
        .with_state(state)
}

// ============================================================================
// Transfer Endpoints
// ============================================================================

/// Create a transfer routed through the upstream exchange
#[utoipa::path(
    post,
    path = "/api/transfers",
    tag = "transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 201, description = "Transfer routed", body = TransferReceipt),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 422, description = "Upstream response failed verification", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
    )
)]
async fn create_transfer(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<CreateTransferRequest>,
) -> Response {
    if let Err(limited) = state.create_limiter.check(&addr.ip().to_string()) {
        return rate_limited_response(limited);
    }

    let request = TransferRequest {
        kind: body.kind,
        recipient_address: body.recipient_address,
        amount: body.amount,
        currency: body.currency.to_ascii_lowercase(),
        network: body.network.to_ascii_lowercase(),
    };

    match state.coordinator.submit(request).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Look up the normalized status of a transfer
#[utoipa::path(
    get,
    path = "/api/transfers/{reference}/status",
    tag = "transfers",
    params(
        ("reference" = String, Path, description = "Internal transfer reference")
    ),
    responses(
        (status = 200, description = "Current status (pending-class for unknown references)", body = StatusView),
        (status = 429, description = "Rate limited", body = ErrorResponse),
    )
)]
async fn transfer_status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(reference): Path<String>,
) -> Response {
    if let Err(limited) = state.general_limiter.check(&addr.ip().to_string()) {
        return rate_limited_response(limited);
    }

    match state.monitor.poll(&reference).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

// ============================================================================
// Health & Monitoring Endpoints
// ============================================================================

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue: state.queue.stats(),
    })
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is live", body = ProbeResponse)
    )
)]
async fn liveness_probe() -> Json<ProbeResponse> {
    Json(ProbeResponse {
        status: "LIVE".to_string(),
    })
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve traffic", body = ProbeResponse)
    )
)]
async fn readiness_probe() -> Json<ProbeResponse> {
    Json(ProbeResponse {
        status: "READY".to_string(),
    })
}

/// Prometheus-style metrics exposition
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "monitoring",
    responses(
        (status = 200, description = "Metrics in text exposition format", content_type = "text/plain")
    )
)]
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let stats = state.queue.stats();
    let output = format!(
        "# HELP sg_outbound_queue_depth Entries admitted but not yet dispatched\n\
         # TYPE sg_outbound_queue_depth gauge\n\
         sg_outbound_queue_depth {}\n\
         # HELP sg_outbound_in_flight Calls currently running against the upstream\n\
         # TYPE sg_outbound_in_flight gauge\n\
         sg_outbound_in_flight {}\n\
         # HELP sg_outbound_dispatched_total Dispatch slots consumed\n\
         # TYPE sg_outbound_dispatched_total counter\n\
         sg_outbound_dispatched_total {}\n\
         # HELP sg_outbound_retried_total Transient failures re-queued with backoff\n\
         # TYPE sg_outbound_retried_total counter\n\
         sg_outbound_retried_total {}\n\
         # HELP sg_outbound_abandoned_total Queued entries dropped because the caller stopped waiting\n\
         # TYPE sg_outbound_abandoned_total counter\n\
         sg_outbound_abandoned_total {}\n",
        stats.queued,
        stats.in_flight,
        stats.total_dispatched,
        stats.total_retried,
        stats.total_abandoned,
    );
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
        .into_response()
}

// ============================================================================
// Response Mapping
// ============================================================================

fn rate_limited_response(limited: RateLimited) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, limited.retry_after_seconds.to_string())],
        Json(ErrorResponse {
            error: format!(
                "Too many requests, retry after {}s",
                limited.retry_after_seconds
            ),
        }),
    )
        .into_response()
}

/// Map gateway errors to stable, user-safe responses. Raw upstream details
/// never leave the process.
fn error_response(err: GatewayError) -> Response {
    let (status, message) = match &err {
        GatewayError::Validation(v) => (StatusCode::BAD_REQUEST, v.to_string()),
        GatewayError::ResponseIntegrity(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Upstream response failed verification; the transfer was not created".to_string(),
        ),
        GatewayError::Upstream(UpstreamError::Rejected { .. }) => (
            StatusCode::BAD_GATEWAY,
            "The exchange service rejected the transfer".to_string(),
        ),
        GatewayError::Upstream(_) => (
            StatusCode::BAD_GATEWAY,
            "The exchange service is currently unavailable".to_string(),
        ),
        GatewayError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        ),
    };

    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }

    (status, Json(ErrorResponse { error: message })).into_response()
}
