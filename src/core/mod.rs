//! Scheduler core: gate, registry, worker protocol and orchestrator.

pub mod error;
pub mod gate;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod task;
mod worker;

pub use error::{AppResult, ItemError, SchedulerError};
pub use gate::{Buffer, BufferPool, FreeWorkerGate, GateSnapshot, GateState};
pub use progress::{CountingProgress, LogProgress, NoProgress, ProgressSink};
pub use registry::{SchedulerId, SchedulerRegistry};
pub use scheduler::Scheduler;
pub use stats::SchedulerStats;
pub use task::{Call, Callable, FunctionId, FunctionTable, Kwargs, TaskFunction, WorkItem};
