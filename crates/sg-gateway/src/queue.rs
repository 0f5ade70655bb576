//! Outbound request queue - admission control for the upstream exchange API
//!
//! Every upstream call in the process goes through this queue. A single
//! dispatcher task owns the queue state and drains it at a fixed cadence of
//! one dispatch slot per `1 / (ceiling * headroom)` seconds, so the
//! documented upstream rate limit holds no matter how many concurrent
//! user-facing requests are in flight.
//!
//! Selection per slot is strictly by priority (status checks above creates),
//! FIFO within equal priority. Transient failures are re-queued with
//! exponential backoff instead of being retried inline, so retries also pass
//! admission control. Callers that stop waiting are discarded before they
//! consume a slot.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use sg_common::QueueStats;
use sg_upstream::{
    CreateTransactionRequest, CreatedTransaction, ExchangeClient, TransactionStatus, UpstreamError,
};

use crate::gateway_metrics;

/// An operation waiting for a dispatch slot
#[derive(Debug)]
pub enum OutboundCall {
    Create(CreateTransactionRequest),
    Status { upstream_id: String },
}

impl OutboundCall {
    fn priority(&self) -> CallPriority {
        match self {
            OutboundCall::Create(_) => CallPriority::Create,
            OutboundCall::Status { .. } => CallPriority::Status,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            OutboundCall::Create(_) => "create",
            OutboundCall::Status { .. } => "status",
        }
    }
}

/// A successful upstream reply
#[derive(Debug)]
pub enum UpstreamReply {
    Created(CreatedTransaction),
    Status(TransactionStatus),
}

/// Dispatch priority. Status checks rank above creates so that users
/// actively watching a transfer are not starved by new submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallPriority {
    Create = 0,
    Status = 1,
}

/// Queue configuration.
///
/// `max_requests_per_second` is the upstream's documented ceiling;
/// dispatch targets `max_requests_per_second * headroom`.
#[derive(Debug, Clone)]
pub struct OutboundQueueConfig {
    pub max_requests_per_second: f64,
    pub headroom: f64,
    /// Attempt cap for transient failures (includes the first attempt)
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for OutboundQueueConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: 10.0,
            headroom: 0.8,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(8),
        }
    }
}

impl OutboundQueueConfig {
    /// Time between dispatch slots
    pub fn dispatch_interval(&self) -> Duration {
        let rate = (self.max_requests_per_second * self.headroom).max(0.1);
        Duration::from_secs_f64(1.0 / rate)
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.retry_max_delay)
    }
}

type ReplyResult = Result<UpstreamReply, UpstreamError>;

struct QueueEntry {
    priority: CallPriority,
    seq: u64,
    attempt: u32,
    /// Earliest instant this entry may be dispatched (backoff re-admission)
    not_before: Option<Instant>,
    call: OutboundCall,
    reply_tx: oneshot::Sender<ReplyResult>,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then earlier sequence number.
        // Retries keep their original sequence and therefore their FIFO slot.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum Command {
    Submit(QueueEntry),
    Shutdown,
}

#[derive(Default)]
struct QueueCounters {
    queued: AtomicU64,
    in_flight: AtomicU64,
    dispatched: AtomicU64,
    retried: AtomicU64,
    abandoned: AtomicU64,
}

/// Process-wide admission-controlled channel to the upstream service.
///
/// Initialized once at process start via [`OutboundQueue::start`] and torn
/// down with [`OutboundQueue::shutdown`]; undispatched callers observe
/// [`UpstreamError::QueueClosed`] at teardown.
pub struct OutboundQueue {
    cmd_tx: mpsc::UnboundedSender<Command>,
    seq: AtomicU64,
    counters: Arc<QueueCounters>,
}

impl OutboundQueue {
    /// Spawn the dispatcher task and return the queue handle.
    pub fn start(config: OutboundQueueConfig, client: Arc<dyn ExchangeClient>) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(QueueCounters::default());

        let queue = Arc::new(Self {
            cmd_tx: cmd_tx.clone(),
            seq: AtomicU64::new(0),
            counters: counters.clone(),
        });

        tokio::spawn(run_dispatcher(config, client, cmd_rx, cmd_tx, counters));

        queue
    }

    /// Submit a call and suspend until it resolves.
    ///
    /// There is no depth limit: callers are never rejected for being "too
    /// many", they simply wait longer for a slot. Dropping the returned
    /// future before dispatch cancels the entry without consuming rate
    /// budget; once dispatched, the upstream call always runs to completion.
    pub async fn enqueue(&self, call: OutboundCall) -> ReplyResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        let entry = QueueEntry {
            priority: call.priority(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            attempt: 0,
            not_before: None,
            call,
            reply_tx,
        };

        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if self.cmd_tx.send(Command::Submit(entry)).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(UpstreamError::QueueClosed);
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::QueueClosed),
        }
    }

    /// Stop the dispatcher. Queued-but-undispatched entries are abandoned;
    /// their callers observe [`UpstreamError::QueueClosed`]. Calls already
    /// dispatched run to completion on their own tasks.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.counters.queued.load(Ordering::SeqCst),
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            total_dispatched: self.counters.dispatched.load(Ordering::SeqCst),
            total_retried: self.counters.retried.load(Ordering::SeqCst),
            total_abandoned: self.counters.abandoned.load(Ordering::SeqCst),
        }
    }
}

async fn run_dispatcher(
    config: OutboundQueueConfig,
    client: Arc<dyn ExchangeClient>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    retry_tx: mpsc::UnboundedSender<Command>,
    counters: Arc<QueueCounters>,
) {
    let mut ready: BinaryHeap<QueueEntry> = BinaryHeap::new();
    let mut delayed: Vec<QueueEntry> = Vec::new();
    // The first slot opens one full period after start; an immediate first
    // tick would allow ceiling + 1 dispatches in the first second.
    let mut interval = tokio::time::interval_at(
        Instant::now() + config.dispatch_interval(),
        config.dispatch_interval(),
    );
    // A stall must not be followed by a burst above the ceiling
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_ms = config.dispatch_interval().as_millis() as u64,
        max_attempts = config.max_attempts,
        "Outbound dispatcher started"
    );

    loop {
        tokio::select! {
            // Drain submissions before taking a dispatch slot so that
            // entries admitted "at the same time" compete on priority.
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Submit(entry)) => {
                    if entry.not_before.is_some_and(|t| t > Instant::now()) {
                        delayed.push(entry);
                    } else {
                        ready.push(entry);
                    }
                }
                Some(Command::Shutdown) | None => break,
            },

            _ = interval.tick() => {
                let now = Instant::now();

                // Re-admit delayed retries that are due
                let mut i = 0;
                while i < delayed.len() {
                    if delayed[i].not_before.is_none_or(|t| t <= now) {
                        ready.push(delayed.swap_remove(i));
                    } else {
                        i += 1;
                    }
                }

                // One dispatch slot per tick. Entries whose caller stopped
                // waiting are dropped without consuming the slot.
                while let Some(entry) = ready.pop() {
                    counters.queued.fetch_sub(1, Ordering::SeqCst);
                    if entry.reply_tx.is_closed() {
                        counters.abandoned.fetch_add(1, Ordering::SeqCst);
                        gateway_metrics::record_call_abandoned(entry.call.kind());
                        debug!(seq = entry.seq, kind = entry.call.kind(), "Dropping abandoned queue entry");
                        continue;
                    }
                    dispatch(entry, &client, &retry_tx, &config, &counters);
                    break;
                }

                gateway_metrics::set_queue_depth(counters.queued.load(Ordering::SeqCst));
            }
        }
    }

    info!(
        abandoned = (ready.len() + delayed.len()) as u64,
        "Outbound dispatcher stopped"
    );
    // Dropping the remaining entries closes their reply channels; waiting
    // callers observe QueueClosed.
}

fn dispatch(
    entry: QueueEntry,
    client: &Arc<dyn ExchangeClient>,
    retry_tx: &mpsc::UnboundedSender<Command>,
    config: &OutboundQueueConfig,
    counters: &Arc<QueueCounters>,
) {
    let client = client.clone();
    let retry_tx = retry_tx.clone();
    let config = config.clone();
    let counters = counters.clone();

    counters.dispatched.fetch_add(1, Ordering::SeqCst);
    counters.in_flight.fetch_add(1, Ordering::SeqCst);
    gateway_metrics::record_call_dispatched(entry.call.kind(), entry.attempt);

    debug!(
        seq = entry.seq,
        kind = entry.call.kind(),
        attempt = entry.attempt,
        "Dispatching outbound call"
    );

    tokio::spawn(async move {
        let result = execute(client.as_ref(), &entry.call).await;
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(reply) => {
                let _ = entry.reply_tx.send(Ok(reply));
            }
            Err(err) if err.is_transient() && entry.attempt + 1 < config.max_attempts => {
                let delay = config.retry_delay(entry.attempt);
                warn!(
                    seq = entry.seq,
                    kind = entry.call.kind(),
                    attempt = entry.attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient upstream failure, re-queueing with backoff"
                );
                counters.retried.fetch_add(1, Ordering::SeqCst);
                counters.queued.fetch_add(1, Ordering::SeqCst);
                gateway_metrics::record_call_retried(entry.call.kind());

                let retry = QueueEntry {
                    attempt: entry.attempt + 1,
                    not_before: Some(Instant::now() + delay),
                    ..entry
                };
                // If the dispatcher is gone the entry drops here and the
                // caller observes QueueClosed.
                let _ = retry_tx.send(Command::Submit(retry));
            }
            Err(err) => {
                let _ = entry.reply_tx.send(Err(err));
            }
        }
    });
}

async fn execute(client: &dyn ExchangeClient, call: &OutboundCall) -> ReplyResult {
    match call {
        OutboundCall::Create(request) => client
            .create_transaction(request)
            .await
            .map(UpstreamReply::Created),
        OutboundCall::Status { upstream_id } => client
            .transaction_status(upstream_id)
            .await
            .map(UpstreamReply::Status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_outranks_create() {
        assert!(CallPriority::Status > CallPriority::Create);
    }

    #[test]
    fn dispatch_interval_honors_headroom() {
        let config = OutboundQueueConfig {
            max_requests_per_second: 10.0,
            headroom: 0.8,
            ..Default::default()
        };
        assert_eq!(config.dispatch_interval(), Duration::from_millis(125));
    }

    #[test]
    fn retry_delay_backs_off_exponentially_with_cap() {
        let config = OutboundQueueConfig::default();
        assert_eq!(config.retry_delay(0), Duration::from_millis(500));
        assert_eq!(config.retry_delay(1), Duration::from_secs(1));
        assert_eq!(config.retry_delay(2), Duration::from_secs(2));
        assert_eq!(config.retry_delay(10), Duration::from_secs(8));
    }
}
