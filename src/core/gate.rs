//! Buffer pool and free-worker gate.
//!
//! One `parking_lot` mutex guards the free-worker counter, the idle buffers,
//! the result aggregate and the progress sink; one condvar wakes a submitter
//! blocked on backpressure or a drain waiting for the last batch.
//!
//! Invariants, checked by [`GateSnapshot`]:
//! - `0 <= free <= pool_size` and `pool_size - free` batches are in flight;
//! - `pooled + checked_out == pool_size + 1` whenever the lock is free.

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::error;

use super::progress::ProgressSink;

/// Output container for the results of exactly one batch.
#[derive(Debug)]
pub struct Buffer<R> {
    items: Vec<R>,
}

impl<R> Buffer<R> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append one result.
    pub fn push(&mut self, item: R) {
        self.items.push(item);
    }

    /// Number of results held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move every result into `out`, leaving the buffer empty but keeping its
    /// allocation.
    pub fn drain_into(&mut self, out: &mut Vec<R>) {
        out.append(&mut self.items);
    }
}

/// Fixed set of reusable buffers.
///
/// Holds `capacity` buffers in total; buffers are only ever moved in and out,
/// never created after construction or destroyed.
#[derive(Debug)]
pub struct BufferPool<R> {
    idle: Vec<Buffer<R>>,
    capacity: usize,
}

impl<R> BufferPool<R> {
    /// Create a pool holding `capacity` empty buffers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: (0..capacity).map(|_| Buffer::new()).collect(),
            capacity,
        }
    }

    /// Take an idle buffer, if any is left.
    pub fn checkout(&mut self) -> Option<Buffer<R>> {
        self.idle.pop()
    }

    /// Return a buffer. It must already be empty.
    pub fn give_back(&mut self, mut buffer: Buffer<R>) {
        if !buffer.is_empty() {
            error!(len = buffer.len(), "buffer returned to pool while holding results; clearing");
            buffer.items.clear();
        }
        self.idle.push(buffer);
    }

    /// Buffers currently idle.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.idle.len()
    }

    /// Buffers currently outside the pool.
    #[must_use]
    pub fn checked_out(&self) -> usize {
        self.capacity - self.idle.len()
    }

    /// Total buffers owned by the pool.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consistent view of the gate taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Worker slots available.
    pub free_workers: usize,
    /// Batches dispatched and not yet completed.
    pub in_flight: usize,
    /// Buffers idle in the pool.
    pub pooled_buffers: usize,
    /// Buffers owned by workers or the completion path.
    pub checked_out_buffers: usize,
}

/// State protected by the gate lock.
pub struct GateState<R> {
    free: usize,
    pool_size: usize,
    buffers: BufferPool<R>,
    results: Vec<R>,
    progress: Box<dyn ProgressSink>,
}

impl<R> GateState<R> {
    /// Claim a worker slot together with a buffer for its batch.
    ///
    /// Returns `None` when no worker is free. While the invariants hold a free
    /// slot always has a buffer to go with it.
    pub fn acquire(&mut self) -> Option<Buffer<R>> {
        if self.free == 0 {
            return None;
        }
        let buffer = self.buffers.checkout()?;
        self.free -= 1;
        Some(buffer)
    }

    /// Drain a finished batch's buffer into the aggregate, recycle it, advance
    /// progress and give the worker slot back.
    ///
    /// Callers must follow up with [`FreeWorkerGate::notify_one`] once the
    /// guard is released or while still holding it.
    pub fn release(&mut self, count: u64, mut buffer: Buffer<R>) {
        buffer.drain_into(&mut self.results);
        self.buffers.give_back(buffer);
        self.progress.advance(count);
        if self.free < self.pool_size {
            self.free += 1;
        } else {
            error!(pool_size = self.pool_size, "release with no batch in flight");
        }
    }

    /// Whether at least one worker is free.
    #[must_use]
    pub const fn has_free_worker(&self) -> bool {
        self.free > 0
    }

    /// Whether every dispatched batch has completed.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.free == self.pool_size
    }

    /// Snapshot of counters and buffer ownership.
    #[must_use]
    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            free_workers: self.free,
            in_flight: self.pool_size - self.free,
            pooled_buffers: self.buffers.pooled(),
            checked_out_buffers: self.buffers.checked_out(),
        }
    }

    /// Close the progress sink and hand over every collected result.
    pub fn finish(&mut self) -> Vec<R> {
        self.progress.close();
        std::mem::take(&mut self.results)
    }
}

/// Counter of idle workers plus the condvar used for backpressure.
pub struct FreeWorkerGate<R> {
    state: Mutex<GateState<R>>,
    freed: Condvar,
}

impl<R> FreeWorkerGate<R> {
    /// Create a gate for `pool_size` workers with `pool_size + 1` buffers.
    pub fn new(pool_size: usize, progress: Box<dyn ProgressSink>) -> Self {
        Self {
            state: Mutex::new(GateState {
                free: pool_size,
                pool_size,
                buffers: BufferPool::new(pool_size + 1),
                results: Vec::new(),
                progress,
            }),
            freed: Condvar::new(),
        }
    }

    /// Lock the gate.
    pub fn lock(&self) -> MutexGuard<'_, GateState<R>> {
        self.state.lock()
    }

    /// Block until a worker is free.
    pub fn wait_until_positive(&self, guard: &mut MutexGuard<'_, GateState<R>>) {
        while !guard.has_free_worker() {
            self.freed.wait(guard);
        }
    }

    /// Block until no batch is in flight.
    pub fn wait_until_idle(&self, guard: &mut MutexGuard<'_, GateState<R>>) {
        while !guard.is_idle() {
            self.freed.wait(guard);
        }
    }

    /// Wake one blocked submitter or drain.
    pub fn notify_one(&self) {
        self.freed.notify_one();
    }

    /// Snapshot under the lock.
    pub fn snapshot(&self) -> GateSnapshot {
        self.state.lock().snapshot()
    }
}
