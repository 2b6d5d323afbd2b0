//! Worker threads and the per-batch execution protocol.
//!
//! Each worker is a dedicated OS thread with its own single-threaded tokio
//! runtime. Workers block on a crossbeam channel for [`Dispatch`] messages,
//! run the batch items strictly in order, and send a [`Completion`] carrying
//! the filled buffer to the pool's single completion thread.
//!
//! # Per-item outcome
//!
//! `Pending -> Running -> {Succeeded, Failed, TimedOut}`. Only `Succeeded`
//! with a non-empty result touches the buffer. Failures and timeouts are
//! logged with the item's arguments and never abort the batch.
//!
//! # Deadlines
//!
//! With a deadline armed the item is spawned on the worker runtime and joined
//! with `tokio::time::timeout`. On expiry the task is aborted: async callables
//! stop at their next await point, blocking callables are abandoned on the
//! runtime's blocking pool and their result discarded. Each item owns its own
//! timer, so nothing else running on the worker is affected.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, SendError, Sender};
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use super::error::{AppResult, ItemError, SchedulerError};
use super::gate::Buffer;
use super::registry::SchedulerId;
use super::stats::SchedulerCounters;
use super::task::{Callable, FunctionTable, WorkItem};

/// Items dispatched together, with the buffer their results go into.
#[derive(Debug)]
pub struct Batch<R> {
    /// Items in submission order.
    pub items: Vec<WorkItem>,
    /// Output buffer checked out for this batch.
    pub buffer: Buffer<R>,
}

/// Message sent from the orchestrator to a worker.
#[derive(Debug)]
pub struct Dispatch<R> {
    /// Scheduler the batch belongs to.
    pub scheduler: SchedulerId,
    /// The batch to run.
    pub batch: Batch<R>,
}

/// Message sent from a worker back to the completion thread.
#[derive(Debug)]
pub struct Completion<R> {
    /// Scheduler the batch belonged to.
    pub scheduler: SchedulerId,
    /// Items processed, dropped ones included.
    pub count: u64,
    /// Buffer holding the batch's results.
    pub buffer: Buffer<R>,
}

/// Read-only state every worker needs to run items.
pub(crate) struct ExecContext<R> {
    pub functions: FunctionTable<R>,
    pub extra: Option<Value>,
    pub timeout: Option<Duration>,
    pub counters: Arc<SchedulerCounters>,
}

/// Fixed set of worker threads plus one completion thread.
pub(crate) struct WorkerPool<R> {
    dispatch_tx: Option<Sender<Dispatch<R>>>,
    workers: Vec<JoinHandle<()>>,
    completer: Option<JoinHandle<()>>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Spawn `worker_count` workers and a completion thread that feeds every
    /// [`Completion`] to `on_complete`, one at a time.
    pub fn spawn<F>(
        worker_count: usize,
        stack_size: usize,
        ctx: Arc<ExecContext<R>>,
        mut on_complete: F,
    ) -> Result<Self, SchedulerError>
    where
        F: FnMut(Completion<R>) + Send + 'static,
    {
        // The gate never lets more than `worker_count` batches out at once.
        let (dispatch_tx, dispatch_rx) = bounded::<Dispatch<R>>(worker_count);
        let (completion_tx, completion_rx) = unbounded::<Completion<R>>();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(SchedulerError::RuntimeBuild)?;
            workers.push(spawn_worker(
                worker_id,
                rt,
                dispatch_rx.clone(),
                completion_tx.clone(),
                Arc::clone(&ctx),
                stack_size,
            )?);
        }
        // Workers hold the only senders; the completion thread exits after them.
        drop(completion_tx);

        let completer = thread::Builder::new()
            .name("bs-completion".into())
            .spawn(move || {
                for completion in completion_rx {
                    on_complete(completion);
                }
                debug!("completion thread exiting");
            })
            .map_err(SchedulerError::WorkerSpawn)?;

        info!(worker_count, "worker pool started");

        Ok(Self {
            dispatch_tx: Some(dispatch_tx),
            workers,
            completer: Some(completer),
        })
    }

    /// Hand a batch to the next idle worker.
    ///
    /// # Errors
    ///
    /// Gives the message back if the pool is shut down.
    pub fn dispatch(&self, message: Dispatch<R>) -> Result<(), Dispatch<R>> {
        match &self.dispatch_tx {
            Some(tx) => tx.send(message).map_err(|SendError(message)| message),
            None => Err(message),
        }
    }

    /// Close the dispatch channel and join every thread.
    pub fn shutdown(&mut self) {
        self.dispatch_tx = None;

        let worker_count = self.workers.len();
        for (worker_id, worker) in self.workers.drain(..).enumerate() {
            if worker.join().is_err() {
                warn!(worker_id, "worker thread panicked");
            }
        }
        if let Some(completer) = self.completer.take() {
            if completer.join().is_err() {
                warn!("completion thread panicked");
            }
        }

        info!(worker_count, "worker pool shut down");
    }
}

impl<R> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        // Detach rather than join: a pool dropped mid-job must not hang the caller.
        if self.dispatch_tx.take().is_some() {
            debug!("worker pool dropped without shutdown - workers will be detached");
        }
    }
}

fn spawn_worker<R: Send + 'static>(
    worker_id: usize,
    rt: Runtime,
    dispatch_rx: Receiver<Dispatch<R>>,
    completion_tx: Sender<Completion<R>>,
    ctx: Arc<ExecContext<R>>,
    stack_size: usize,
) -> Result<JoinHandle<()>, SchedulerError> {
    thread::Builder::new()
        .name(format!("bs-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");

            for Dispatch { scheduler, batch } in &dispatch_rx {
                let size = batch.items.len();
                debug!(worker_id, %scheduler, size, "worker executing batch");

                let (count, buffer) = execute_batch(&rt, &ctx, scheduler, batch);
                let completion = Completion {
                    scheduler,
                    count,
                    buffer,
                };
                if completion_tx.send(completion).is_err() {
                    warn!(worker_id, "completion channel closed, exiting");
                    break;
                }
            }

            // Abandoned blocking items must not hold the thread hostage.
            rt.shutdown_background();
            debug!(worker_id, "worker thread exiting");
        })
        .map_err(SchedulerError::WorkerSpawn)
}

/// Run every item of `batch` in order and return the number processed along
/// with the filled buffer.
pub(crate) fn execute_batch<R: Send + 'static>(
    rt: &Runtime,
    ctx: &ExecContext<R>,
    scheduler: SchedulerId,
    batch: Batch<R>,
) -> (u64, Buffer<R>) {
    let Batch { items, mut buffer } = batch;
    let mut count = 0;

    for item in items {
        count += 1;
        let function = Arc::clone(&item.function);
        let args = item.args.clone();
        let kwargs = item.kwargs.clone();

        match run_item(rt, ctx, item) {
            Ok(Some(result)) => {
                buffer.push(result);
                ctx.counters.succeeded_items.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                ctx.counters.empty_results.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                warn!(
                    %scheduler,
                    function = %function,
                    args = ?args,
                    kwargs = ?kwargs,
                    error = %error,
                    "work item dropped"
                );
                let counter = if error.is_timeout() {
                    &ctx.counters.timed_out_items
                } else {
                    &ctx.counters.failed_items
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
        ctx.counters.completed_items.fetch_add(1, Ordering::Relaxed);
    }

    (count, buffer)
}

fn run_item<R: Send + 'static>(
    rt: &Runtime,
    ctx: &ExecContext<R>,
    item: WorkItem,
) -> Result<Option<R>, ItemError> {
    let callable = ctx
        .functions
        .get(&item.function)
        .cloned()
        .ok_or_else(|| ItemError::UnknownFunction(item.function.to_string()))?;
    let call = item.into_call(ctx.extra.clone());

    match (callable, ctx.timeout) {
        (Callable::Blocking(f), None) => panic::catch_unwind(AssertUnwindSafe(|| f(call)))
            .map_err(|payload| ItemError::Panicked(panic_message(&*payload)))?
            .map_err(ItemError::Failed),
        (Callable::Blocking(f), Some(limit)) => rt.block_on(async move {
            let handle = tokio::task::spawn_blocking(move || f(call));
            join_with_deadline(handle, limit).await
        }),
        (Callable::Async(f), timeout) => rt.block_on(async move {
            let handle = tokio::spawn(async move { f.call(call).await });
            match timeout {
                Some(limit) => join_with_deadline(handle, limit).await,
                None => flatten(handle.await),
            }
        }),
    }
}

async fn join_with_deadline<R>(
    mut handle: tokio::task::JoinHandle<AppResult<Option<R>>>,
    limit: Duration,
) -> Result<Option<R>, ItemError> {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            handle.abort();
            Err(ItemError::TimedOut(limit))
        }
    }
}

fn flatten<R>(joined: Result<AppResult<Option<R>>, JoinError>) -> Result<Option<R>, ItemError> {
    match joined {
        Ok(result) => result.map_err(ItemError::Failed),
        Err(e) if e.is_panic() => Err(ItemError::Panicked(panic_message(&*e.into_panic()))),
        Err(_) => Err(ItemError::Cancelled),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}
