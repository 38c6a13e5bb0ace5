//! Compiled triggers and their activations
//!
//! A [`Trigger`] pairs a name with a compiled [`Script`]. Each activation gets
//! a fresh [`Interpreter`] running on tokio's blocking pool, so one slow or
//! failing activation never holds up another.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

use super::event::{ActorId, EventContext};
use super::Shared;
use crate::interpreter::{
    CompileError, HostError, Interpreter, InterpreterHost, Interrupt, Interrupter, NodeRef,
    Outcome, RunState, Script, Value,
};

/// A named, compiled trigger script.
pub struct Trigger {
    name: String,
    script: Arc<Script>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("fingerprint", &self.script.fingerprint())
            .finish()
    }
}

impl Trigger {
    pub(crate) fn compile(
        name: String,
        source: String,
        shared: Arc<Shared>,
    ) -> Result<Self, CompileError> {
        let script = Script::compile(source)?;
        Ok(Self {
            name,
            script,
            shared,
        })
    }

    /// Trigger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text the trigger was compiled from.
    pub fn source(&self) -> &str {
        self.script.source()
    }

    /// Compiled script.
    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    /// Hex blake3 hash of the source text.
    pub fn fingerprint(&self) -> String {
        self.script.fingerprint()
    }

    /// Independent copy compiled afresh from the same source.
    pub fn try_clone(&self) -> Result<Trigger, CompileError> {
        Trigger::compile(
            self.name.clone(),
            self.script.source().to_string(),
            Arc::clone(&self.shared),
        )
        .inspect_err(|err| {
            error!(target: "trigger", trigger = %self.name, error = %err, "failed to clone trigger");
        })
    }

    /// Run the script for `event`.
    ///
    /// When the event's actor is still on cooldown the actor is sent the
    /// cooldown notice, nothing runs and `None` is returned. Otherwise the
    /// run is spawned and its handle returned; failures are reported to the
    /// log and the actor, never to the caller.
    pub fn activate(
        &self,
        event: EventContext,
        variables: HashMap<String, Value>,
    ) -> Option<JoinHandle<()>> {
        if let Some(actor) = event.actor() {
            let now = self.shared.clock.now();
            if let Some(seconds) = self.shared.cooldowns.remaining_seconds(&actor, now) {
                debug!(target: "trigger", trigger = %self.name, actor = %actor, seconds, "activation rejected by cooldown");
                self.shared
                    .messenger
                    .notify(actor, &self.shared.config.cooldown_message(seconds));
                return None;
            }
        }

        let activation = Activation {
            id: Uuid::new_v4(),
            trigger: self.name.clone(),
            script: Arc::clone(&self.script),
            shared: Arc::clone(&self.shared),
            event,
            variables,
        };
        Some(self.shared.handle.spawn_blocking(move || activation.run()))
    }
}

/// One run of a trigger, owned by a blocking task.
struct Activation {
    id: Uuid,
    trigger: String,
    script: Arc<Script>,
    shared: Arc<Shared>,
    event: EventContext,
    variables: HashMap<String, Value>,
}

impl Activation {
    fn run(self) {
        let span = info_span!(target: "trigger", "activation", trigger = %self.trigger, id = %self.id);
        let _guard = span.enter();

        let actor = self.event.actor();
        let host = TriggerHost {
            event: self.event.clone(),
            shared: Arc::clone(&self.shared),
        };
        let mut interpreter =
            Interpreter::new(Arc::clone(&self.script), host, self.shared.config.limits());
        interpreter.bind("event", Value::Object(Arc::new(self.event)));
        interpreter.bind_all(self.variables);

        let mut watcher = CooldownWatcher {
            actor,
            shared: &self.shared,
            recorded: None,
            deadline: self
                .shared
                .config
                .timeout_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
        };
        let result = interpreter.run(&mut watcher);
        watcher.record(interpreter.cooldown_end());

        match result {
            Ok(Outcome::Completed) => {
                debug!(target: "trigger", steps = interpreter.state().steps(), "activation completed");
            }
            Ok(Outcome::Aborted) => {
                debug!(target: "trigger", steps = interpreter.state().steps(), "activation aborted");
            }
            Err(err) => {
                error!(
                    target: "trigger",
                    trigger = %self.trigger,
                    actor = ?actor,
                    error = %err,
                    "could not execute trigger"
                );
                if let Some(actor) = actor {
                    let config = &self.shared.config;
                    let messenger = &self.shared.messenger;
                    messenger.notify(actor, &config.error_notice);
                    messenger.notify(actor, &err.to_string());
                    messenger.notify(actor, &config.admin_hint);
                }
            }
        }
    }
}

/// Writes the run's cooldown to the shared store as soon as it appears and
/// enforces the optional wall-clock budget.
struct CooldownWatcher<'a> {
    actor: Option<ActorId>,
    shared: &'a Shared,
    recorded: Option<DateTime<Utc>>,
    deadline: Option<Instant>,
}

impl CooldownWatcher<'_> {
    fn record(&mut self, end: Option<DateTime<Utc>>) {
        let (Some(actor), Some(end)) = (self.actor, end) else {
            return;
        };
        if self.recorded != Some(end) {
            self.shared.cooldowns.put(actor, end);
            self.recorded = Some(end);
        }
    }
}

impl Interrupter for CooldownWatcher<'_> {
    fn on_node(&mut self, _node: NodeRef<'_>, state: &RunState) -> Interrupt {
        self.record(state.cooldown_end());
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                warn!(target: "trigger", steps = state.steps(), "activation exceeded its time budget");
                Interrupt::Abort
            }
            _ => Interrupt::Continue,
        }
    }
}

/// Resolves script calls against the manager's bindings for one event.
struct TriggerHost {
    event: EventContext,
    shared: Arc<Shared>,
}

impl InterpreterHost for TriggerHost {
    fn invoke_executor(&mut self, name: &str, args: &[Value]) -> Result<Value, HostError> {
        let executor = self
            .shared
            .bindings
            .executors
            .get(name)
            .ok_or(HostError::Undefined)?;
        executor.invoke(args, &self.event).map_err(HostError::Failed)
    }

    fn evaluate_condition(&mut self, name: &str, args: &[Value]) -> Result<bool, HostError> {
        let condition = self
            .shared
            .bindings
            .conditions
            .get(name)
            .ok_or(HostError::Undefined)?;
        condition.evaluate(args, &self.event).map_err(HostError::Failed)
    }

    fn read_global(&self, name: &str) -> Option<Value> {
        self.shared.bindings.globals.get(name)
    }

    fn write_global(&mut self, name: &str, value: Value) {
        self.shared.bindings.globals.put(name, value);
    }

    fn now(&self) -> DateTime<Utc> {
        self.shared.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cooldown::{CooldownStore, ManualClock};
    use crate::runtime::globals::MemoryGlobals;
    use crate::runtime::messaging::Messenger;
    use crate::runtime::registry::{ConditionRegistry, ExecutorRegistry};
    use crate::runtime::{Bindings, EngineConfig, TriggerManager};
    use chrono::TimeZone;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Inbox(Mutex<Vec<(ActorId, String)>>);

    impl Messenger for Inbox {
        fn notify(&self, actor: ActorId, text: &str) {
            self.0.lock().push((actor, text.to_string()));
        }
    }

    fn manager(config: EngineConfig, inbox: Arc<Inbox>) -> TriggerManager {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TriggerManager::builder(Bindings::default())
            .config(config)
            .messenger(inbox)
            .clock(Arc::new(ManualClock::new(start)))
            .build()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn event_and_variables_are_bound() {
        let inbox = Arc::new(Inbox::default());
        let manager = manager(EngineConfig::default(), Arc::clone(&inbox));
        let trigger = manager
            .compile("t", "global.seen = event.name\nglobal.x = x")
            .unwrap();
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), Value::Int(3));
        trigger
            .activate(EventContext::new("join"), vars)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(manager.bindings().globals.get("seen"), Some(Value::from("join")));
        assert_eq!(manager.bindings().globals.get("x"), Some(Value::Int(3)));
        assert!(inbox.0.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn time_budget_aborts_quietly() {
        let inbox = Arc::new(Inbox::default());
        let config = EngineConfig {
            timeout_ms: Some(0),
            ..EngineConfig::default()
        };
        let manager = manager(config, Arc::clone(&inbox));
        let trigger = manager.compile("t", "global.ran = true").unwrap();
        let actor = ActorId::new();
        trigger
            .activate(EventContext::for_actor("tick", actor), HashMap::new())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(manager.bindings().globals.get("ran"), None);
        assert!(inbox.0.lock().is_empty());
    }

    #[derive(Default)]
    struct RecordingCooldowns(Mutex<Vec<(ActorId, DateTime<Utc>)>>);

    impl CooldownStore for RecordingCooldowns {
        fn get(&self, actor: &ActorId) -> Option<DateTime<Utc>> {
            self.0
                .lock()
                .iter()
                .rev()
                .find(|(who, _)| who == actor)
                .map(|(_, until)| *until)
        }

        fn put(&self, actor: ActorId, until: DateTime<Utc>) {
            self.0.lock().push((actor, until));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clone_behaves_like_the_original() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let executors = ExecutorRegistry::new();
        let sink = Arc::clone(&calls);
        executors.register("Message", move |args: &[Value], event: &EventContext| {
            sink.lock().push((event.actor(), args.to_vec()));
            Ok(Value::Null)
        });
        let bindings = Bindings::new(
            Arc::new(executors),
            Arc::new(ConditionRegistry::new()),
            Arc::new(MemoryGlobals::new()),
        );
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cooldowns = Arc::new(RecordingCooldowns::default());
        let inbox = Arc::new(Inbox::default());
        let manager = TriggerManager::builder(bindings)
            .messenger(inbox.clone())
            .cooldowns(cooldowns.clone())
            .clock(Arc::new(ManualClock::new(start)))
            .build()
            .unwrap();

        let trigger = manager
            .compile("t", "#Message \"before\"\ncooldown 5\n#Message event.name, x")
            .unwrap();
        let copy = trigger.try_clone().unwrap();
        assert_eq!(copy.name(), trigger.name());
        assert_eq!(copy.fingerprint(), trigger.fingerprint());
        assert!(!Arc::ptr_eq(copy.script(), trigger.script()));

        let (first, second) = (ActorId::new(), ActorId::new());
        for (candidate, actor) in [(&trigger, first), (&copy, second)] {
            let mut vars = HashMap::new();
            vars.insert("x".to_string(), Value::Int(7));
            candidate
                .activate(EventContext::for_actor("use", actor), vars)
                .unwrap()
                .await
                .unwrap();
        }

        let calls_for = |actor: ActorId| -> Vec<Vec<Value>> {
            calls
                .lock()
                .iter()
                .filter(|(who, _)| *who == Some(actor))
                .map(|(_, args)| args.clone())
                .collect()
        };
        let expected = vec![
            vec![Value::from("before")],
            vec![Value::from("use"), Value::Int(7)],
        ];
        assert_eq!(calls_for(first), expected);
        assert_eq!(calls_for(second), expected);

        let until = start + chrono::Duration::seconds(5);
        assert_eq!(*cooldowns.0.lock(), vec![(first, until), (second, until)]);
        assert!(inbox.0.lock().is_empty());
    }
}
