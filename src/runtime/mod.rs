//! Trigger manager and public API
//!
//! This module provides the [`TriggerManager`] that owns the collaborators
//! shared by every activation (registries, cooldown store, messenger, clock)
//! and exposes compilation, a named trigger table and activation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

// Submodules
pub mod cooldown;
pub mod error;
pub mod event;
pub mod globals;
pub mod messaging;
pub mod registry;
pub mod storage;
pub mod trigger;

use crate::interpreter::{CompileError, Limits, Value};
use cooldown::{Clock, CooldownStore, MemoryCooldowns, SystemClock};
use error::{Result, TriggerError};
use event::{ActorId, EventContext};
use globals::{GlobalStore, MemoryGlobals};
use messaging::{Messenger, TracingMessenger};
use registry::{ConditionRegistry, ExecutorRegistry};

/// Configuration for the trigger engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum node visits per activation
    pub max_steps: u64,

    /// Maximum evaluation nesting per activation
    pub max_depth: usize,

    /// Wall-clock budget per activation in milliseconds (none = unbounded)
    pub timeout_ms: Option<u64>,

    /// Notice sent while an actor is on cooldown; `{seconds}` is substituted
    pub cooldown_notice: String,

    /// First line sent to an actor when their activation fails
    pub error_notice: String,

    /// Last line sent to an actor when their activation fails
    pub admin_hint: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_steps: limits.max_steps,
            max_depth: limits.max_depth,
            timeout_ms: None,
            cooldown_notice: "Cooldown: {seconds} secs left.".to_string(),
            error_notice: "Could not execute this trigger.".to_string(),
            admin_hint: "If you are administrator, see console for details.".to_string(),
        }
    }
}

impl EngineConfig {
    /// Interpreter ceilings derived from this config.
    pub fn limits(&self) -> Limits {
        Limits {
            max_steps: self.max_steps,
            max_depth: self.max_depth,
        }
    }

    /// Render the cooldown notice for `seconds` remaining.
    pub fn cooldown_message(&self, seconds: i64) -> String {
        self.cooldown_notice
            .replace("{seconds}", &seconds.to_string())
    }
}

/// References to the registries a trigger resolves names against.
#[derive(Clone)]
pub struct Bindings {
    /// `#Name` lookups.
    pub executors: Arc<ExecutorRegistry>,
    /// `?name` lookups.
    pub conditions: Arc<ConditionRegistry>,
    /// `global.*` reads and writes.
    pub globals: Arc<dyn GlobalStore>,
}

impl Bindings {
    /// Bundle existing registries.
    pub fn new(
        executors: Arc<ExecutorRegistry>,
        conditions: Arc<ConditionRegistry>,
        globals: Arc<dyn GlobalStore>,
    ) -> Self {
        Self {
            executors,
            conditions,
            globals,
        }
    }
}

impl Default for Bindings {
    fn default() -> Self {
        Self::new(
            Arc::new(ExecutorRegistry::new()),
            Arc::new(ConditionRegistry::new()),
            Arc::new(MemoryGlobals::new()),
        )
    }
}

/// State shared between the manager, its triggers and their activations.
pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) bindings: Bindings,
    pub(crate) cooldowns: Arc<dyn CooldownStore>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) handle: Handle,
}

/// Builder for [`TriggerManager`].
pub struct TriggerManagerBuilder {
    config: EngineConfig,
    bindings: Bindings,
    cooldowns: Option<Arc<dyn CooldownStore>>,
    messenger: Option<Arc<dyn Messenger>>,
    clock: Option<Arc<dyn Clock>>,
    handle: Option<Handle>,
}

impl TriggerManagerBuilder {
    /// Use the given engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an externally owned cooldown store.
    pub fn cooldowns(mut self, cooldowns: Arc<dyn CooldownStore>) -> Self {
        self.cooldowns = Some(cooldowns);
        self
    }

    /// Deliver actor notices through `messenger`.
    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Read time from `clock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Spawn activations on `handle` instead of the ambient runtime.
    pub fn handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Finish building. Fails when no tokio runtime is available.
    pub fn build(self) -> Result<TriggerManager> {
        if self.config.max_depth == 0 {
            return Err(TriggerError::Config("max_depth must be at least 1".into()));
        }
        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|err| TriggerError::NoRuntime(err.to_string()))?,
        };
        let shared = Shared {
            config: self.config,
            bindings: self.bindings,
            cooldowns: self
                .cooldowns
                .unwrap_or_else(|| Arc::new(MemoryCooldowns::new())),
            messenger: self.messenger.unwrap_or_else(|| Arc::new(TracingMessenger)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            handle,
        };
        Ok(TriggerManager {
            shared: Arc::new(shared),
            triggers: RwLock::new(HashMap::new()),
        })
    }
}

/// Owns shared collaborators and a table of named triggers.
pub struct TriggerManager {
    shared: Arc<Shared>,
    triggers: RwLock<HashMap<String, Arc<trigger::Trigger>>>,
}

impl TriggerManager {
    /// Start building a manager around `bindings`.
    pub fn builder(bindings: Bindings) -> TriggerManagerBuilder {
        TriggerManagerBuilder {
            config: EngineConfig::default(),
            bindings,
            cooldowns: None,
            messenger: None,
            clock: None,
            handle: None,
        }
    }

    /// Manager with default collaborators on the current tokio runtime.
    pub fn new(config: EngineConfig, bindings: Bindings) -> Result<Self> {
        Self::builder(bindings).config(config).build()
    }

    /// Compile `source` into a trigger bound to this manager.
    pub fn compile(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> std::result::Result<trigger::Trigger, CompileError> {
        trigger::Trigger::compile(name.into(), source.into(), Arc::clone(&self.shared))
    }

    /// Compile and store a trigger under `name`, replacing any previous one.
    pub fn load(&self, name: impl Into<String>, source: impl Into<String>) -> Result<()> {
        let name = name.into();
        let trigger = self.compile(name.clone(), source)?;
        info!(target: "trigger", trigger = %name, fingerprint = %trigger.fingerprint(), "loaded trigger");
        self.triggers.write().insert(name, Arc::new(trigger));
        Ok(())
    }

    /// Store an already compiled trigger under its name.
    pub fn insert(&self, trigger: trigger::Trigger) -> Option<Arc<trigger::Trigger>> {
        self.triggers
            .write()
            .insert(trigger.name().to_string(), Arc::new(trigger))
    }

    /// Trigger stored under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<trigger::Trigger>> {
        self.triggers.read().get(name).cloned()
    }

    /// Discard the trigger stored under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<trigger::Trigger>> {
        self.triggers.write().remove(name)
    }

    /// Names of stored triggers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.triggers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Activate the stored trigger `name`.
    ///
    /// Returns `Ok(None)` when the actor is still on cooldown.
    pub fn activate(
        &self,
        name: &str,
        event: EventContext,
        variables: HashMap<String, Value>,
    ) -> Result<Option<JoinHandle<()>>> {
        let trigger = self
            .get(name)
            .ok_or_else(|| TriggerError::NotFound(name.to_string()))?;
        Ok(trigger.activate(event, variables))
    }

    /// Seconds until `actor` may activate again, if on cooldown.
    pub fn remaining_seconds(&self, actor: &ActorId) -> Option<i64> {
        self.shared
            .cooldowns
            .remaining_seconds(actor, self.shared.clock.now())
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// The registries triggers resolve against.
    pub fn bindings(&self) -> &Bindings {
        &self.shared.bindings
    }

    /// The shared cooldown store.
    pub fn cooldowns(&self) -> &Arc<dyn CooldownStore> {
        &self.shared.cooldowns
    }
}

// Re-export commonly used types
pub use trigger::Trigger;
