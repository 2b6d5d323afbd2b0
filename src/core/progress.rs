//! Progress reporting collaborators.
//!
//! The scheduler advances its sink once per finished batch, from the
//! completion path and under the gate lock, so implementations never see
//! concurrent calls.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

/// Receives progress updates from a scheduler.
pub trait ProgressSink: Send {
    /// Record `n` more processed items (failed items included).
    fn advance(&mut self, n: u64);
    /// Called once when the scheduler has drained.
    fn close(&mut self);
}

/// Sink that ignores everything. Used when progress is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&mut self, _n: u64) {}
    fn close(&mut self) {}
}

/// Sink that reports through `tracing` events.
///
/// With a known total it logs at every tenth of the way; without one it logs
/// each advance at debug level.
#[derive(Debug)]
pub struct LogProgress {
    description: String,
    total: Option<u64>,
    done: u64,
    last_decile: u64,
}

impl LogProgress {
    /// Create a sink with a label and optional expected total.
    pub fn new(description: impl Into<String>, total: Option<u64>) -> Self {
        Self {
            description: description.into(),
            total,
            done: 0,
            last_decile: 0,
        }
    }

    /// Items processed so far.
    #[must_use]
    pub const fn done(&self) -> u64 {
        self.done
    }
}

impl ProgressSink for LogProgress {
    fn advance(&mut self, n: u64) {
        self.done += n;
        match self.total {
            Some(total) if total > 0 => {
                let decile = (self.done.min(total) * 10) / total;
                if decile > self.last_decile {
                    self.last_decile = decile;
                    info!(
                        description = %self.description,
                        done = self.done,
                        total,
                        percent = decile * 10,
                        "progress"
                    );
                }
            }
            _ => {
                tracing::debug!(description = %self.description, done = self.done, "progress");
            }
        }
    }

    fn close(&mut self) {
        info!(
            description = %self.description,
            done = self.done,
            total = ?self.total,
            "finished"
        );
    }
}

/// Sink backed by shared atomics, so the caller can watch progress from
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct CountingProgress {
    advanced: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl CountingProgress {
    /// Create a new counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total advanced so far.
    #[must_use]
    pub fn advanced(&self) -> u64 {
        self.advanced.load(Ordering::Acquire)
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ProgressSink for CountingProgress {
    fn advance(&mut self, n: u64) {
        self.advanced.fetch_add(n, Ordering::AcqRel);
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
