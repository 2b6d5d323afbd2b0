//! Work items and the function table they are dispatched through.
//!
//! Callables never travel to a worker. Each one is registered under a name in
//! a [`FunctionTable`], the table is shared read-only with the workers, and a
//! [`WorkItem`] only carries the name plus JSON-encoded arguments. A worker
//! resolves the name when it runs the item.
//!
//! ```
//! use prometheus_batch_scheduler::core::FunctionTable;
//!
//! let mut functions = FunctionTable::<i64>::new();
//! functions.register("double", |call| {
//!     let x: i64 = call.arg(0)?;
//!     Ok(Some(2 * x))
//! });
//! assert!(functions.contains("double"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::AppResult;

/// Name a callable is registered under.
pub type FunctionId = Arc<str>;

/// Keyword arguments of a call.
pub type Kwargs = Map<String, Value>;

/// Arguments handed to a callable.
#[derive(Debug, Clone, Default)]
pub struct Call {
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Kwargs,
    /// Extra argument configured on the scheduler, if any.
    pub extra: Option<Value>,
}

impl Call {
    /// Deserialize positional argument `index`.
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or has the wrong shape.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> AppResult<T> {
        let value = self
            .args
            .get(index)
            .with_context(|| format!("missing positional argument {index}"))?;
        serde_json::from_value(value.clone())
            .with_context(|| format!("positional argument {index}"))
    }

    /// Deserialize keyword argument `name`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Fails if the argument is present but has the wrong shape.
    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> AppResult<Option<T>> {
        self.kwargs
            .get(name)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .with_context(|| format!("keyword argument `{name}`"))
            })
            .transpose()
    }

    /// Deserialize the injected extra argument.
    ///
    /// # Errors
    ///
    /// Fails if no extra argument is configured or it has the wrong shape.
    pub fn extra<T: DeserializeOwned>(&self) -> AppResult<T> {
        let value = self.extra.as_ref().context("no extra argument configured")?;
        serde_json::from_value(value.clone()).context("extra argument")
    }
}

/// An async callable run as a task on the worker's runtime.
///
/// Returning `Ok(None)` means "no result": the item completes but adds
/// nothing to the aggregate.
#[async_trait]
pub trait TaskFunction<R>: Send + Sync + 'static
where
    R: Send + 'static,
{
    /// Run the call.
    async fn call(&self, call: Call) -> AppResult<Option<R>>;
}

/// Signature of a blocking callable.
pub type BlockingFn<R> = dyn Fn(Call) -> AppResult<Option<R>> + Send + Sync;

/// A registered callable.
pub enum Callable<R> {
    /// Runs on the worker thread, or on the runtime's blocking pool when a
    /// deadline is armed.
    Blocking(Arc<BlockingFn<R>>),
    /// Runs as a task on the worker's single-threaded runtime.
    Async(Arc<dyn TaskFunction<R>>),
}

impl<R> Clone for Callable<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Blocking(f) => Self::Blocking(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
        }
    }
}

impl<R> fmt::Debug for Callable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking(_) => f.write_str("Callable::Blocking"),
            Self::Async(_) => f.write_str("Callable::Async"),
        }
    }
}

/// Lookup table from function name to callable.
pub struct FunctionTable<R> {
    functions: HashMap<FunctionId, Callable<R>>,
}

impl<R: Send + 'static> FunctionTable<R> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a blocking callable, replacing any previous entry of that name.
    pub fn register<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Call) -> AppResult<Option<R>> + Send + Sync + 'static,
    {
        self.functions
            .insert(Arc::from(name), Callable::Blocking(Arc::new(f)));
        self
    }

    /// Register an async callable, replacing any previous entry of that name.
    pub fn register_async<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: TaskFunction<R>,
    {
        self.functions
            .insert(Arc::from(name), Callable::Async(Arc::new(f)));
        self
    }

    /// Look up a callable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Callable<R>> {
        self.functions.get(name)
    }

    /// Whether a callable is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of registered callables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl<R: Send + 'static> Default for FunctionTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of submitted work. Consumed exactly once by a worker.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Name of the callable to run.
    pub function: FunctionId,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Kwargs,
}

impl WorkItem {
    /// Create a work item.
    pub fn new(function: &str, args: Vec<Value>, kwargs: Kwargs) -> Self {
        Self {
            function: Arc::from(function),
            args,
            kwargs,
        }
    }

    /// Turn the item into the call a callable receives.
    pub(crate) fn into_call(self, extra: Option<Value>) -> Call {
        Call {
            args: self.args,
            kwargs: self.kwargs,
            extra,
        }
    }
}
