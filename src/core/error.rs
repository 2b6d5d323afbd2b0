//! Error types for scheduler construction and per-item execution.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while building or configuring a scheduler.
///
/// Once a scheduler is running nothing is raised to the caller: per-item
/// failures are [`ItemError`]s that the worker logs and drops.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker or completion thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    /// A worker runtime could not be built.
    #[error("failed to build worker runtime: {0}")]
    RuntimeBuild(#[source] std::io::Error),
    /// An environment variable held a value that could not be parsed.
    #[error("environment variable {name} has invalid value `{value}`")]
    EnvVar {
        /// Variable name.
        name: String,
        /// Raw value found in the environment.
        value: String,
    },
    /// Configuration text could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Why a single work item produced no result.
///
/// All variants are equivalent from the caller's point of view: the item is
/// dropped and the batch carries on.
#[derive(Debug, Error)]
pub enum ItemError {
    /// No callable is registered under the requested name.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// The callable returned an error.
    #[error("execution failed: {0:#}")]
    Failed(anyhow::Error),
    /// The per-item deadline fired.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    /// The callable panicked.
    #[error("panicked: {0}")]
    Panicked(String),
    /// The runtime cancelled the item before it finished.
    #[error("cancelled by runtime")]
    Cancelled,
}

impl ItemError {
    /// Whether this failure came from the deadline rather than the callable.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Application-facing result using anyhow for callable return values.
pub type AppResult<T> = Result<T, anyhow::Error>;
