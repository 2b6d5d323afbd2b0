//! # Prometheus Batch Scheduler
//!
//! A bounded-concurrency task scheduler that fans caller-submitted work out
//! over a fixed pool of worker threads and gathers the results into one
//! collection.
//!
//! ## Core Problem Solved
//!
//! Bulk jobs (scoring a dataset, converting a directory of files, calling a
//! model per record) want every core busy without letting the submitter race
//! ahead and queue unbounded work in memory. This crate keeps at most
//! `worker_count` batches in flight, batches adaptively under load and blocks
//! the submitter only when its local batch is full.
//!
//! ## Key Features
//!
//! - **Adaptive batching**: per-item dispatch while workers are idle, batches
//!   up to `max_batch_size` while they are saturated
//! - **Backpressure**: `schedule` blocks only when the pending batch is full
//!   and no worker is free
//! - **Fault isolation**: a failing, panicking or timed-out item is logged and
//!   dropped; the rest of its batch carries on
//! - **Per-item deadlines**: each item runs under its own timer on the
//!   worker's tokio runtime
//! - **Buffer recycling**: `worker_count + 1` result buffers are reused for
//!   the whole job
//!
//! ## Usage
//!
//! ```rust,ignore
//! use prometheus_batch_scheduler::config::SchedulerConfig;
//! use prometheus_batch_scheduler::core::{FunctionTable, Scheduler};
//! use serde_json::json;
//!
//! let mut functions = FunctionTable::<i64>::new();
//! functions.register("double", |call| Ok(Some(2 * call.arg::<i64>(0)?)));
//!
//! let mut scheduler = Scheduler::new(
//!     SchedulerConfig::new()
//!         .with_worker_count(4)
//!         .with_max_batch_size(32)
//!         .with_per_item_timeout_ms(1_000),
//!     functions,
//! )?;
//!
//! for x in 0..10_000 {
//!     scheduler.schedule_args("double", vec![json!(x)]);
//! }
//! let results = scheduler.wait();
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - End-to-end scheduling scenarios

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduler core: gate, buffer pool, registry, worker protocol.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Shared utilities.
pub mod util;
