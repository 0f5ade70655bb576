//! Swapgate Transaction Routing Gateway
//!
//! This crate provides the mediation layer between the application and the
//! rate-limited upstream exchange service:
//! - OutboundQueue: process-wide admission control for all upstream calls,
//!   with priority ordering and in-queue retry
//! - TransferCoordinator: validation, submission, response integrity checks,
//!   and durable routing-mapping persistence
//! - StatusMonitor: normalization of upstream status into the stable
//!   client-facing vocabulary, with exactly-once terminal persistence
//! - InboundRateLimiter: per-client protection of the public surface
//! - API: the public HTTP endpoints

pub mod api;
pub mod coordinator;
pub mod error;
pub mod gateway_metrics;
pub mod limiter;
pub mod monitor;
pub mod policy;
pub mod queue;

pub use coordinator::TransferCoordinator;
pub use error::{GatewayError, ValidationError};
pub use limiter::{spawn_limiter_sweeper, InboundRateLimiter, RateLimited};
pub use monitor::StatusMonitor;
pub use policy::{AssetRule, TransferPolicy};
pub use queue::{CallPriority, OutboundCall, OutboundQueue, OutboundQueueConfig, UpstreamReply};

pub type Result<T> = std::result::Result<T, GatewayError>;
