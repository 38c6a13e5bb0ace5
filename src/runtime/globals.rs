//! Global variable store shared by every trigger.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::interpreter::Value;

/// Externally owned key-value store behind `global.*` accesses.
pub trait GlobalStore: Send + Sync {
    /// Current value of `name`, if set.
    fn get(&self, name: &str) -> Option<Value>;
    /// Set `name` to `value`.
    fn put(&self, name: &str, value: Value);
}

/// In-memory [`GlobalStore`].
#[derive(Debug, Default)]
pub struct MemoryGlobals {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryGlobals {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a variable.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.write().remove(name)
    }

    /// Number of variables stored.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// JSON view of every variable, keyed by name.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Replace every variable with the entries of a JSON object.
    pub fn load_json(&self, json: serde_json::Value) -> anyhow::Result<()> {
        let serde_json::Value::Object(map) = json else {
            anyhow::bail!("globals snapshot must be a JSON object");
        };
        let mut values = self.values.write();
        values.clear();
        values.extend(map.into_iter().map(|(name, value)| (name, Value::from(value))));
        Ok(())
    }
}

impl GlobalStore for MemoryGlobals {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    fn put(&self, name: &str, value: Value) {
        self.values.write().insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_snapshot_round_trip() {
        let globals = MemoryGlobals::new();
        globals.put("counter", Value::Int(3));
        globals.put("motd", Value::from("hello"));

        let restored = MemoryGlobals::new();
        restored.put("stale", Value::Bool(true));
        restored.load_json(globals.to_json()).expect("load");

        assert_eq!(restored.get("counter"), Some(Value::Int(3)));
        assert_eq!(restored.get("motd"), Some(Value::from("hello")));
        assert!(restored.get("stale").is_none());
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn rejects_non_object_snapshot() {
        let globals = MemoryGlobals::new();
        assert!(globals.load_json(serde_json::json!([1, 2])).is_err());
    }
}
