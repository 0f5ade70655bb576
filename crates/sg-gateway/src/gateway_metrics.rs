//! Metrics for the routing gateway
//!
//! Counters and gauges for:
//! - Outbound queue dispatch activity
//! - Inbound rate-limit rejections

use metrics::{counter, gauge};

/// Record an outbound call being handed a dispatch slot
pub fn record_call_dispatched(kind: &'static str, attempt: u32) {
    counter!(
        "sg_outbound_dispatched_total",
        "kind" => kind,
        "retry" => (attempt > 0).to_string()
    )
    .increment(1);
}

/// Record a queued call dropped because its caller stopped waiting
pub fn record_call_abandoned(kind: &'static str) {
    counter!(
        "sg_outbound_abandoned_total",
        "kind" => kind
    )
    .increment(1);
}

/// Record a transient failure being re-queued for retry
pub fn record_call_retried(kind: &'static str) {
    counter!(
        "sg_outbound_retried_total",
        "kind" => kind
    )
    .increment(1);
}

/// Update the outbound queue depth gauge
pub fn set_queue_depth(depth: u64) {
    gauge!("sg_outbound_queue_depth").set(depth as f64);
}

/// Record an inbound request rejected by a rate-limit tier
pub fn record_inbound_rejected(tier: &'static str) {
    counter!(
        "sg_inbound_rejected_total",
        "tier" => tier
    )
    .increment(1);
}
