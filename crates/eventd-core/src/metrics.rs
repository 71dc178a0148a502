//! Event bus metrics.
//!
//! Lightweight atomic counters covering the delivery pipeline: appends,
//! batches, long-poll outcomes, and retention housekeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the event bus.
pub struct BusMetrics {
    /// Bus start time.
    started_at: Instant,

    // Append path
    appends: AtomicU64,
    injected: AtomicU64,

    // Delivery path
    batches_delivered: AtomicU64,
    records_delivered: AtomicU64,
    empty_polls: AtomicU64,
    waiter_wakes: AtomicU64,
    poll_cancellations: AtomicU64,

    // Housekeeping
    pruned_records: AtomicU64,
    prunes_deferred: AtomicU64,
}

/// Point-in-time snapshot of [`BusMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Seconds since the bus started.
    pub uptime_secs: u64,
    /// Records appended, including injected ones.
    pub appends: u64,
    /// Synthetic records admitted through injection.
    pub injected: u64,
    /// Non-empty batches returned to pollers.
    pub batches_delivered: u64,
    /// Total records returned to pollers.
    pub records_delivered: u64,
    /// Polls that timed out with an empty batch.
    pub empty_polls: u64,
    /// Blocked polls woken by a matching append.
    pub waiter_wakes: u64,
    /// Blocked polls cancelled by session termination.
    pub poll_cancellations: u64,
    /// Records removed by pruning.
    pub pruned_records: u64,
    /// Prune passes that hit the retention bound but deferred for a slow
    /// subscriber.
    pub prunes_deferred: u64,
}

impl BusMetrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            appends: AtomicU64::new(0),
            injected: AtomicU64::new(0),
            batches_delivered: AtomicU64::new(0),
            records_delivered: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            waiter_wakes: AtomicU64::new(0),
            poll_cancellations: AtomicU64::new(0),
            pruned_records: AtomicU64::new(0),
            prunes_deferred: AtomicU64::new(0),
        }
    }

    /// Record an append. `injected` marks synthetic events.
    pub fn record_append(&self, injected: bool) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        if injected {
            self.injected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a non-empty batch delivery.
    pub fn record_delivery(&self, records: u64) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.records_delivered.fetch_add(records, Ordering::Relaxed);
    }

    /// Record a poll that timed out empty.
    pub fn record_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a blocked poll woken by an append.
    pub fn record_wake(&self) {
        self.waiter_wakes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a blocked poll cancelled by session termination.
    pub fn record_cancellation(&self) {
        self.poll_cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a prune pass.
    pub fn record_prune(&self, removed: u64, deferred: bool) {
        self.pruned_records.fetch_add(removed, Ordering::Relaxed);
        if deferred {
            self.prunes_deferred.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            appends: self.appends.load(Ordering::Relaxed),
            injected: self.injected.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            waiter_wakes: self.waiter_wakes.load(Ordering::Relaxed),
            poll_cancellations: self.poll_cancellations.load(Ordering::Relaxed),
            pruned_records: self.pruned_records.load(Ordering::Relaxed),
            prunes_deferred: self.prunes_deferred.load(Ordering::Relaxed),
        }
    }
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedBusMetrics = Arc<BusMetrics>;

/// Create a shared metrics registry.
pub fn new_shared_metrics() -> SharedBusMetrics {
    Arc::new(BusMetrics::new())
}
