//! Inbound rate limiter - per-client protection of the public surface
//!
//! Independent of the outbound ceiling. Two tiers are deployed: a loose
//! general limit for read paths and a strict limit for transfer creation,
//! the expensive, funds-relevant path. Counters are per-instance; across a
//! horizontally scaled deployment this is a slightly weaker bound, which is
//! the documented trade-off.

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::gateway_metrics;

/// Rejection carrying the retry-after hint, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after_seconds: u64,
}

/// Sliding per-client limiter: `max_requests` per `window`, keyed by client
/// address.
pub struct InboundRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    clock: DefaultClock,
    name: &'static str,
}

impl InboundRateLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        let max = NonZeroU32::new(max_requests.max(1)).expect("max_requests is at least 1");
        // Spread the quota across the window with burst capacity for the
        // full allowance, so "max_requests per window" holds for a client
        // that fires everything at once.
        let quota = Quota::with_period(window / max.get())
            .expect("window must be non-zero")
            .allow_burst(max);

        info!(
            tier = name,
            max_requests = max_requests,
            window_secs = window.as_secs(),
            "Inbound rate limiter initialized"
        );

        Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
            name,
        }
    }

    /// Consume one slot for the client, or reject with a retry-after hint.
    pub fn check(&self, client: &str) -> Result<(), RateLimited> {
        match self.limiter.check_key(&client.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                gateway_metrics::record_inbound_rejected(self.name);
                debug!(tier = self.name, client = %client, "Inbound request rate limited");
                Err(RateLimited {
                    retry_after_seconds: (wait.as_secs_f64().ceil() as u64).max(1),
                })
            }
        }
    }

    /// Drop counters for clients that have been idle long enough to be
    /// irrelevant, bounding memory.
    pub fn sweep(&self) {
        self.limiter.retain_recent();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

/// Periodically sweep idle counters on the given limiters.
pub fn spawn_limiter_sweeper(
    limiters: Vec<Arc<InboundRateLimiter>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for limiter in &limiters {
                limiter.sweep();
            }
        }
    })
}
