//! Executor and condition registries
//!
//! Hosts register named operations before (or while) triggers run. Lookups
//! are case-sensitive and return shared handles, so a registration can be
//! replaced without disturbing activations that already resolved it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::event::EventContext;
use crate::interpreter::Value;

/// Named operation callable from scripts as `#Name`.
pub trait Executor: Send + Sync {
    /// Run the operation with evaluated arguments.
    fn invoke(&self, args: &[Value], event: &EventContext) -> anyhow::Result<Value>;
}

/// Named predicate callable from scripts as `?name`.
pub trait Condition: Send + Sync {
    /// Evaluate the predicate with evaluated arguments.
    fn evaluate(&self, args: &[Value], event: &EventContext) -> anyhow::Result<bool>;
}

struct FnExecutor<F>(F);

impl<F> Executor for FnExecutor<F>
where
    F: Fn(&[Value], &EventContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn invoke(&self, args: &[Value], event: &EventContext) -> anyhow::Result<Value> {
        (self.0)(args, event)
    }
}

struct FnCondition<F>(F);

impl<F> Condition for FnCondition<F>
where
    F: Fn(&[Value], &EventContext) -> anyhow::Result<bool> + Send + Sync,
{
    fn evaluate(&self, args: &[Value], event: &EventContext) -> anyhow::Result<bool> {
        (self.0)(args, event)
    }
}

/// Thread-safe name → capability table.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: RwLock<HashMap<String, Arc<T>>>,
}

/// Registry of executors.
pub type ExecutorRegistry = Registry<dyn Executor>;

/// Registry of conditions.
pub type ConditionRegistry = Registry<dyn Condition>;

impl<T: ?Sized> Registry<T> {
    fn with_kind(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) an entry.
    pub fn insert(&self, name: impl Into<String>, entry: Arc<T>) {
        let name = name.into();
        debug!(target: "trigger", kind = self.kind, name = %name, "registering");
        self.entries.write().insert(name, entry);
    }

    /// Look up an entry by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.read().get(name).cloned()
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        self.entries.write().remove(name)
    }

    /// Whether an entry exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Registry<dyn Executor> {
    /// Create an empty executor registry.
    pub fn new() -> Self {
        Self::with_kind("executor")
    }

    /// Register an executor implemented as a closure.
    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value], &EventContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(FnExecutor(f)));
    }
}

impl Default for Registry<dyn Executor> {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry<dyn Condition> {
    /// Create an empty condition registry.
    pub fn new() -> Self {
        Self::with_kind("condition")
    }

    /// Register a condition implemented as a closure.
    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value], &EventContext) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(FnCondition(f)));
    }
}

impl Default for Registry<dyn Condition> {
    fn default() -> Self {
        Self::new()
    }
}
