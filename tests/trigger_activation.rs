use std::collections::HashMap;
use std::io;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use trigscript::interpreter::Value;
use trigscript::runtime::cooldown::{Clock, CooldownStore, ManualClock};
use trigscript::runtime::error::TriggerError;
use trigscript::runtime::event::{ActorId, EventContext};
use trigscript::runtime::globals::{GlobalStore, MemoryGlobals};
use trigscript::runtime::messaging::Messenger;
use trigscript::runtime::registry::{ConditionRegistry, ExecutorRegistry};
use trigscript::{Bindings, EngineConfig, TriggerManager};
use tracing_subscriber::fmt::MakeWriter;

type Calls = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

#[derive(Default)]
struct Inbox {
    notices: Mutex<Vec<(ActorId, String)>>,
}

impl Inbox {
    fn for_actor(&self, actor: ActorId) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|(to, _)| *to == actor)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Messenger for Inbox {
    fn notify(&self, actor: ActorId, text: &str) {
        self.notices.lock().push((actor, text.to_string()));
    }
}

struct Harness {
    manager: TriggerManager,
    clock: Arc<ManualClock>,
    inbox: Arc<Inbox>,
    calls: Calls,
    globals: Arc<MemoryGlobals>,
}

fn harness() -> Harness {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));

    let executors = ExecutorRegistry::new();
    let sink = Arc::clone(&calls);
    executors.register("Message", move |args: &[Value], event: &EventContext| {
        sink.lock().push((event.name().to_string(), args.to_vec()));
        Ok(Value::Null)
    });

    let conditions = ConditionRegistry::new();
    conditions.register("isVip", |args: &[Value], _event: &EventContext| {
        Ok(matches!(args.first(), Some(Value::Int(level)) if *level >= 10))
    });

    let globals = Arc::new(MemoryGlobals::new());
    let bindings = Bindings::new(Arc::new(executors), Arc::new(conditions), globals.clone());

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let inbox = Arc::new(Inbox::default());
    let manager = TriggerManager::builder(bindings)
        .clock(clock.clone())
        .messenger(inbox.clone())
        .build()
        .expect("manager");

    Harness {
        manager,
        clock,
        inbox,
        calls,
        globals,
    }
}

/// Operator log shared by every test in this binary.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn lines_containing(&self, needle: &str) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Activations log from blocking-pool threads, so the capture has to be global.
fn operator_log() -> LogBuffer {
    static LOG: OnceLock<LogBuffer> = OnceLock::new();
    LOG.get_or_init(|| {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("global subscriber");
        buffer
    })
    .clone()
}

impl Harness {
    fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cooldown_rejects_until_window_passes() {
    let h = harness();
    let trigger = h
        .manager
        .compile("guarded", "cooldown 10\n#Message \"ran\"")
        .unwrap();
    let actor = ActorId::new();

    trigger
        .activate(EventContext::for_actor("use", actor), HashMap::new())
        .expect("first activation runs")
        .await
        .unwrap();
    assert_eq!(h.calls().len(), 1);
    assert_eq!(h.manager.remaining_seconds(&actor), Some(10));

    h.clock.advance(Duration::seconds(4));
    let rejected = trigger.activate(EventContext::for_actor("use", actor), HashMap::new());
    assert!(rejected.is_none());
    assert_eq!(h.calls().len(), 1);
    assert_eq!(h.inbox.for_actor(actor), vec!["Cooldown: 6 secs left.".to_string()]);

    h.clock.advance(Duration::seconds(6));
    trigger
        .activate(EventContext::for_actor("use", actor), HashMap::new())
        .expect("third activation runs")
        .await
        .unwrap();
    assert_eq!(h.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn cooldown_is_per_actor() {
    let h = harness();
    let trigger = h.manager.compile("guarded", "cooldown 30").unwrap();
    let first = ActorId::new();
    let second = ActorId::new();

    trigger
        .activate(EventContext::for_actor("use", first), HashMap::new())
        .unwrap()
        .await
        .unwrap();
    assert!(trigger
        .activate(EventContext::for_actor("use", first), HashMap::new())
        .is_none());
    assert!(trigger
        .activate(EventContext::for_actor("use", second), HashMap::new())
        .is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn cooldown_then_message_records_both() {
    let h = harness();
    let trigger = h
        .manager
        .compile("greet", "cooldown 5\n#Message \"hi\"")
        .unwrap();
    let actor = ActorId::new();

    trigger
        .activate(EventContext::for_actor("join", actor), HashMap::new())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(
        h.calls(),
        vec![("join".to_string(), vec![Value::from("hi")])]
    );
    let until = h.manager.cooldowns().get(&actor).expect("cooldown stored");
    assert_eq!(until, h.clock_now() + Duration::seconds(5));
}

#[tokio::test(flavor = "multi_thread")]
async fn trailing_cooldown_is_still_recorded() {
    let h = harness();
    let trigger = h
        .manager
        .compile("late", "#Message \"first\"\ncooldown 3")
        .unwrap();
    let actor = ActorId::new();

    trigger
        .activate(EventContext::for_actor("use", actor), HashMap::new())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(h.manager.remaining_seconds(&actor), Some(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn undefined_executor_notifies_actor() {
    let log = operator_log();
    let h = harness();
    let trigger = h
        .manager
        .compile("missing-executor", "#DoesNotExist")
        .unwrap();
    let actor = ActorId::new();

    trigger
        .activate(EventContext::for_actor("use", actor), HashMap::new())
        .unwrap()
        .await
        .unwrap();

    let notices = h.inbox.for_actor(actor);
    assert_eq!(notices.len(), 3);
    assert_eq!(notices[0], "Could not execute this trigger.");
    assert!(notices[1].contains("DoesNotExist"), "got {}", notices[1]);
    assert_eq!(
        notices[2],
        "If you are administrator, see console for details."
    );

    let lines = log.lines_containing("trigger=missing-executor");
    let failure = lines
        .iter()
        .find(|line| line.contains("could not execute trigger"))
        .unwrap_or_else(|| panic!("no failure line in {:?}", lines));
    assert!(failure.contains("ERROR"), "got {}", failure);
    assert!(failure.contains("DoesNotExist"), "got {}", failure);
    assert!(failure.contains(&actor.to_string()), "got {}", failure);
}

#[tokio::test(flavor = "multi_thread")]
async fn cooldown_before_failure_survives() {
    let h = harness();
    let trigger = h
        .manager
        .compile("broken", "cooldown 5\n#DoesNotExist")
        .unwrap();
    let actor = ActorId::new();

    trigger
        .activate(EventContext::for_actor("use", actor), HashMap::new())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(h.manager.remaining_seconds(&actor), Some(5));
    assert_eq!(h.inbox.for_actor(actor).len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn global_counter_accumulates() {
    let h = harness();
    h.globals.put("counter", Value::Int(0));
    let trigger = h
        .manager
        .compile("count", "global.counter = global.counter + 1")
        .unwrap();

    for _ in 0..2 {
        trigger
            .activate(EventContext::new("tick"), HashMap::new())
            .unwrap()
            .await
            .unwrap();
    }
    assert_eq!(h.globals.get("counter"), Some(Value::Int(2)));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_activations_keep_separate_locals() {
    let h = harness();
    let trigger = h
        .manager
        .compile(
            "step",
            "let x = start\n#Message x\nx = x + 1\n#Message x",
        )
        .unwrap();

    let mut a_vars = HashMap::new();
    a_vars.insert("start".to_string(), Value::Int(10));
    let mut b_vars = HashMap::new();
    b_vars.insert("start".to_string(), Value::Int(20));

    let a = trigger.activate(EventContext::new("a"), a_vars).unwrap();
    let b = trigger.activate(EventContext::new("b"), b_vars).unwrap();
    a.await.unwrap();
    b.await.unwrap();

    let calls = h.calls();
    let seen = |event: &str| -> Vec<Vec<Value>> {
        calls
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, args)| args.clone())
            .collect()
    };
    assert_eq!(seen("a"), vec![vec![Value::Int(10)], vec![Value::Int(11)]]);
    assert_eq!(seen("b"), vec![vec![Value::Int(20)], vec![Value::Int(21)]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_activation_leaves_the_other_alone() {
    let h = harness();
    let trigger = h.manager.compile("echo", "#Message value").unwrap();
    let failing = ActorId::new();
    let healthy = ActorId::new();

    let mut vars = HashMap::new();
    vars.insert("value".to_string(), Value::from("ok"));
    let a = trigger
        .activate(EventContext::for_actor("a", failing), HashMap::new())
        .unwrap();
    let b = trigger
        .activate(EventContext::for_actor("b", healthy), vars)
        .unwrap();
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(h.calls(), vec![("b".to_string(), vec![Value::from("ok")])]);
    assert_eq!(h.inbox.for_actor(failing).len(), 3);
    assert!(h.inbox.for_actor(healthy).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn locals_do_not_leak_between_activations() {
    let h = harness();
    let setter = h.manager.compile("set", "let secret = 1").unwrap();
    let reader = h.manager.compile("read", "#Message secret").unwrap();
    let actor = ActorId::new();

    setter
        .activate(EventContext::new("use"), HashMap::new())
        .unwrap()
        .await
        .unwrap();
    reader
        .activate(EventContext::for_actor("use", actor), HashMap::new())
        .unwrap()
        .await
        .unwrap();

    assert!(h.calls().is_empty());
    let notices = h.inbox.for_actor(actor);
    assert!(notices[1].contains("secret"), "got {}", notices[1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn conditions_see_event_attributes() {
    let h = harness();
    let trigger = h
        .manager
        .compile(
            "door",
            "if ?isVip(event.level) {\n  #Message \"vip\"\n} else {\n  #Message \"guest\"\n}",
        )
        .unwrap();

    for level in [12i64, 3i64] {
        trigger
            .activate(
                EventContext::new("door").with_attribute("level", level),
                HashMap::new(),
            )
            .unwrap()
            .await
            .unwrap();
    }
    let said: Vec<Vec<Value>> = h.calls().into_iter().map(|(_, args)| args).collect();
    assert_eq!(said, vec![vec![Value::from("vip")], vec![Value::from("guest")]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn manager_keeps_named_triggers() {
    let h = harness();
    h.manager.load("greet", "#Message \"hello\"").unwrap();
    h.manager.load("bye", "#Message \"bye\"").unwrap();
    assert_eq!(h.manager.names(), vec!["bye".to_string(), "greet".to_string()]);

    let bad = h.manager.load("broken", "if {");
    assert!(matches!(bad, Err(TriggerError::Compile(_))));
    assert!(h.manager.get("broken").is_none());

    h.manager
        .activate("greet", EventContext::new("join"), HashMap::new())
        .unwrap()
        .expect("not on cooldown")
        .await
        .unwrap();
    assert_eq!(h.calls(), vec![("join".to_string(), vec![Value::from("hello")])]);

    let missing = h
        .manager
        .activate("nope", EventContext::new("join"), HashMap::new());
    assert!(matches!(missing, Err(TriggerError::NotFound(name)) if name == "nope"));

    assert!(h.manager.remove("bye").is_some());
    assert_eq!(h.manager.names(), vec!["greet".to_string()]);
}

#[test]
fn manager_needs_a_runtime() {
    let result = TriggerManager::new(EngineConfig::default(), Bindings::default());
    assert!(matches!(result, Err(TriggerError::NoRuntime(_))));
}

#[tokio::test]
async fn zero_depth_is_rejected() {
    let config = EngineConfig {
        max_depth: 0,
        ..EngineConfig::default()
    };
    let result = TriggerManager::new(config, Bindings::default());
    assert!(matches!(result, Err(TriggerError::Config(_))));
}
