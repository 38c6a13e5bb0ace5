//! Actor identities and per-activation event context.

use crate::interpreter::{HostObject, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identity of whoever caused an event (a player, a bot, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Create a new random ActorId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event that activated a trigger.
///
/// Scripts see it as the implicit `event` variable: `event.name`,
/// `event.actor` and every attribute are readable as fields.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    name: String,
    actor: Option<ActorId>,
    attributes: BTreeMap<String, Value>,
}

impl EventContext {
    /// Event without an actor (cooldowns never apply).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actor: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Event caused by `actor`.
    pub fn for_actor(name: impl Into<String>, actor: ActorId) -> Self {
        Self {
            actor: Some(actor),
            ..Self::new(name)
        }
    }

    /// Attach an attribute readable from scripts.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Actor that caused the event, if any.
    pub fn actor(&self) -> Option<ActorId> {
        self.actor
    }

    /// Attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

impl HostObject for EventContext {
    fn type_name(&self) -> &str {
        "event"
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::Str(self.name.clone())),
            "actor" => Some(
                self.actor
                    .map(|actor| Value::Str(actor.to_string()))
                    .unwrap_or(Value::Null),
            ),
            other => self.attributes.get(other).cloned(),
        }
    }

    fn describe(&self) -> String {
        format!("<event {}>", self.name)
    }
}
