//! Scheduler statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Statistics about scheduler throughput and item outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Items passed to `schedule`.
    pub submitted_items: u64,

    /// Batches handed to workers.
    pub dispatched_batches: u64,

    /// Items a worker finished with, whatever the outcome.
    pub completed_items: u64,

    /// Items that produced a result.
    pub succeeded_items: u64,

    /// Items whose callable returned no result.
    pub empty_results: u64,

    /// Items dropped because the callable failed or panicked.
    pub failed_items: u64,

    /// Items dropped because their deadline fired.
    pub timed_out_items: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    pub submitted_items: AtomicU64,
    pub dispatched_batches: AtomicU64,
    pub completed_items: AtomicU64,
    pub succeeded_items: AtomicU64,
    pub empty_results: AtomicU64,
    pub failed_items: AtomicU64,
    pub timed_out_items: AtomicU64,
}

impl SchedulerCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> SchedulerStats {
        SchedulerStats {
            worker_count,
            submitted_items: self.submitted_items.load(Ordering::Relaxed),
            dispatched_batches: self.dispatched_batches.load(Ordering::Relaxed),
            completed_items: self.completed_items.load(Ordering::Relaxed),
            succeeded_items: self.succeeded_items.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            failed_items: self.failed_items.load(Ordering::Relaxed),
            timed_out_items: self.timed_out_items.load(Ordering::Relaxed),
        }
    }
}
