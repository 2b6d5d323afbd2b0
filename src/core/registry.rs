//! Process-wide table from scheduler identity to scheduler state.
//!
//! Completion messages coming back from workers carry only a [`SchedulerId`].
//! The completion thread resolves that id here to reach the state it has to
//! update. Entries are type-erased so schedulers with different result types
//! share one table; resolving with the wrong type yields `None`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use uuid::Uuid;

/// Opaque identity assigned to a scheduler at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulerId(Uuid);

impl SchedulerId {
    /// Generate a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SchedulerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Concurrent map of live schedulers.
#[derive(Default)]
pub struct SchedulerRegistry {
    entries: RwLock<HashMap<SchedulerId, Entry>>,
}

impl SchedulerRegistry {
    /// Create an empty registry. Most callers want [`SchedulerRegistry::global`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<SchedulerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Register `state` under `id`, replacing any previous entry.
    pub fn register<T: Send + Sync + 'static>(&self, id: SchedulerId, state: Arc<T>) {
        self.entries.write().insert(id, state);
    }

    /// Remove the entry for `id`. Returns whether one was present.
    pub fn unregister(&self, id: SchedulerId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    /// Look up `id` and downcast to `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self, id: SchedulerId) -> Option<Arc<T>> {
        let entry = self.entries.read().get(&id).cloned()?;
        entry.downcast::<T>().ok()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: SchedulerId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Number of registered schedulers.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
