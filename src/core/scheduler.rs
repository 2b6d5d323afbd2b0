//! The batch scheduler: submission, adaptive batching, dispatch and drain.
//!
//! Batching adapts to load. While a worker is free every submission goes out
//! at once, even as a batch of one. While all workers are busy submissions
//! accumulate locally, and only when that pending batch reaches
//! `max_batch_size` does `schedule` block until a worker frees up. That block
//! is the only backpressure point.
//!
//! ```rust,no_run
//! use prometheus_batch_scheduler::config::SchedulerConfig;
//! use prometheus_batch_scheduler::core::{FunctionTable, Scheduler};
//! use serde_json::json;
//!
//! let mut functions = FunctionTable::<i64>::new();
//! functions.register("double", |call| Ok(Some(2 * call.arg::<i64>(0)?)));
//!
//! let config = SchedulerConfig::new().with_worker_count(2);
//! let mut scheduler = Scheduler::new(config, functions)?;
//! for x in 1..=4 {
//!     scheduler.schedule_args("double", vec![json!(x)]);
//! }
//! let mut results = scheduler.wait();
//! results.sort_unstable();
//! assert_eq!(results, vec![2, 4, 6, 8]);
//! # Ok::<(), prometheus_batch_scheduler::core::SchedulerError>(())
//! ```

use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;

use super::error::SchedulerError;
use super::gate::{Buffer, FreeWorkerGate, GateSnapshot, GateState};
use super::progress::{LogProgress, NoProgress, ProgressSink};
use super::registry::{SchedulerId, SchedulerRegistry};
use super::stats::{SchedulerCounters, SchedulerStats};
use super::task::{FunctionTable, Kwargs, WorkItem};
use super::worker::{Batch, Completion, Dispatch, ExecContext, WorkerPool};

/// State reached from the completion thread through the registry.
pub(crate) struct Shared<R> {
    gate: FreeWorkerGate<R>,
}

impl<R> Shared<R> {
    /// Fold a finished batch back in: drain its buffer into the aggregate,
    /// recycle the buffer, advance progress, free the worker slot and wake
    /// one waiter. All under the gate lock.
    fn on_complete(&self, count: u64, buffer: Buffer<R>) {
        let mut state = self.gate.lock();
        state.release(count, buffer);
        self.gate.notify_one();
    }
}

/// Bounded-concurrency scheduler over a fixed pool of worker threads.
///
/// Created once per job. [`wait`](Self::wait) consumes it, so nothing can be
/// scheduled after the drain.
pub struct Scheduler<R: Send + 'static> {
    id: SchedulerId,
    config: SchedulerConfig,
    shared: Arc<Shared<R>>,
    pending: Vec<WorkItem>,
    pool: WorkerPool<R>,
    counters: Arc<SchedulerCounters>,
}

impl<R: Send + 'static> Scheduler<R> {
    /// Create a scheduler and start its workers.
    ///
    /// Progress goes to a [`LogProgress`] sink when `progress_enabled` is set.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidConfig` for a bad configuration, or a spawn /
    /// runtime error if the worker threads cannot be started.
    pub fn new(config: SchedulerConfig, functions: FunctionTable<R>) -> Result<Self, SchedulerError> {
        let progress: Box<dyn ProgressSink> = if config.progress_enabled {
            Box::new(LogProgress::new(
                config.description.clone(),
                config.total_expected_items,
            ))
        } else {
            Box::new(NoProgress)
        };
        Self::build(config, functions, progress)
    }

    /// Create a scheduler reporting progress to `sink`.
    ///
    /// The sink is only used when `progress_enabled` is set.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::new`].
    pub fn with_progress<S>(
        config: SchedulerConfig,
        functions: FunctionTable<R>,
        sink: S,
    ) -> Result<Self, SchedulerError>
    where
        S: ProgressSink + 'static,
    {
        let progress: Box<dyn ProgressSink> = if config.progress_enabled {
            Box::new(sink)
        } else {
            Box::new(NoProgress)
        };
        Self::build(config, functions, progress)
    }

    fn build(
        config: SchedulerConfig,
        functions: FunctionTable<R>,
        progress: Box<dyn ProgressSink>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let id = SchedulerId::new();
        let counters = Arc::new(SchedulerCounters::default());
        let shared = Arc::new(Shared {
            gate: FreeWorkerGate::new(config.worker_count, progress),
        });
        SchedulerRegistry::global().register(id, Arc::clone(&shared));

        let ctx = Arc::new(ExecContext {
            functions,
            extra: config.extra_argument.clone(),
            timeout: config.per_item_timeout(),
            counters: Arc::clone(&counters),
        });
        let pool = match WorkerPool::spawn(
            config.worker_count,
            config.thread_stack_size,
            ctx,
            route_completion::<R>,
        ) {
            Ok(pool) => pool,
            Err(e) => {
                SchedulerRegistry::global().unregister(id);
                return Err(e);
            }
        };

        info!(
            %id,
            worker_count = config.worker_count,
            max_batch_size = config.max_batch_size,
            timeout_ms = config.per_item_timeout_ms,
            description = %config.description,
            "scheduler started"
        );

        Ok(Self {
            id,
            pending: Vec::with_capacity(config.max_batch_size),
            config,
            shared,
            pool,
            counters,
        })
    }

    /// Submit one call of `function`.
    ///
    /// Dispatches at once if a worker is free. Otherwise the item joins the
    /// pending batch; if that batch is already full, blocks until a worker
    /// frees up and sends the full batch first. Never fails: unknown
    /// functions and callable errors show up as dropped items and log lines.
    pub fn schedule(&mut self, function: &str, args: Vec<Value>, kwargs: Kwargs) {
        self.counters.submitted_items.fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(&self.shared);
        let mut state = shared.gate.lock();

        if self.pending.len() >= self.config.max_batch_size {
            if !state.has_free_worker() {
                debug!(id = %self.id, pending = self.pending.len(), "pending batch full, waiting for a worker");
            }
            shared.gate.wait_until_positive(&mut state);
            self.dispatch_locked(&mut state);
        }

        self.pending.push(WorkItem::new(function, args, kwargs));

        if state.has_free_worker() {
            self.dispatch_locked(&mut state);
        }
    }

    /// Submit a call with positional arguments only.
    pub fn schedule_args(&mut self, function: &str, args: Vec<Value>) {
        self.schedule(function, args, Kwargs::new());
    }

    /// Flush the pending batch, block until every batch has completed, and
    /// return all results produced. Order is unspecified.
    pub fn wait(self) -> Vec<R> {
        self.wait_with_stats().0
    }

    /// Like [`wait`](Self::wait), also returning the final statistics.
    pub fn wait_with_stats(mut self) -> (Vec<R>, SchedulerStats) {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.gate.lock();

        if !self.pending.is_empty() {
            shared.gate.wait_until_positive(&mut state);
            self.dispatch_locked(&mut state);
        }
        shared.gate.wait_until_idle(&mut state);
        let results = state.finish();
        drop(state);

        self.pool.shutdown();

        info!(
            id = %self.id,
            results = results.len(),
            submitted = self.counters.submitted_items.load(Ordering::Relaxed),
            "scheduler drained"
        );
        (results, self.stats())
    }

    /// Hand the pending batch to a worker. Caller holds the gate lock and has
    /// checked that a worker is free.
    fn dispatch_locked(&mut self, state: &mut GateState<R>) {
        if self.pending.is_empty() {
            return;
        }
        let Some(buffer) = state.acquire() else {
            error!(id = %self.id, "dispatch attempted with no free worker");
            return;
        };

        let items = mem::replace(
            &mut self.pending,
            Vec::with_capacity(self.config.max_batch_size),
        );
        let size = items.len();
        self.counters.dispatched_batches.fetch_add(1, Ordering::Relaxed);
        debug!(id = %self.id, size, "dispatching batch");

        let message = Dispatch {
            scheduler: self.id,
            batch: Batch { items, buffer },
        };
        if let Err(Dispatch { batch, .. }) = self.pool.dispatch(message) {
            // Workers are gone; count the batch as failed and give the slot back.
            let count = batch.items.len() as u64;
            error!(id = %self.id, count, "worker pool closed, batch dropped");
            self.counters.failed_items.fetch_add(count, Ordering::Relaxed);
            state.release(count, batch.buffer);
        }
    }

    /// This scheduler's registry identity.
    #[must_use]
    pub const fn id(&self) -> SchedulerId {
        self.id
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Items waiting locally for a free worker.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Free workers, in-flight batches and buffer ownership.
    #[must_use]
    pub fn gate_snapshot(&self) -> GateSnapshot {
        self.shared.gate.snapshot()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.counters.snapshot(self.config.worker_count)
    }
}

impl<R: Send + 'static> Drop for Scheduler<R> {
    fn drop(&mut self) {
        SchedulerRegistry::global().unregister(self.id);
        debug!(id = %self.id, "scheduler unregistered");
    }
}

/// Completion-thread entry point: find the owning scheduler and fold the
/// batch in.
fn route_completion<R: Send + 'static>(completion: Completion<R>) {
    let Completion {
        scheduler,
        count,
        buffer,
    } = completion;
    match SchedulerRegistry::global().resolve::<Shared<R>>(scheduler) {
        Some(shared) => shared.on_complete(count, buffer),
        None => warn!(%scheduler, count, "completion for unregistered scheduler discarded"),
    }
}
