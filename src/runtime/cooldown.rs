//! Per-actor cooldown tracking
//!
//! Entries are written when a run executes a `cooldown` statement and read
//! before each activation. Expired entries stay in the map; they are simply
//! ignored once their instant has passed.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::event::ActorId;

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.write() += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Shared actor → cooldown-expiry mapping.
pub trait CooldownStore: Send + Sync {
    /// Stored expiry for `actor`, expired or not.
    fn get(&self, actor: &ActorId) -> Option<DateTime<Utc>>;

    /// Record a new expiry for `actor`.
    fn put(&self, actor: ActorId, until: DateTime<Utc>);

    /// Whole seconds (rounded up) until `actor` may activate again, or `None`
    /// when no cooldown is active at `now`.
    fn remaining_seconds(&self, actor: &ActorId, now: DateTime<Utc>) -> Option<i64> {
        let until = self.get(actor)?;
        if until <= now {
            return None;
        }
        let millis = (until - now).num_milliseconds();
        Some((millis + 999) / 1000)
    }
}

/// In-memory [`CooldownStore`].
#[derive(Debug, Default)]
pub struct MemoryCooldowns {
    ends: RwLock<HashMap<ActorId, DateTime<Utc>>>,
}

impl MemoryCooldowns {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actors with a recorded expiry (including stale ones).
    pub fn len(&self) -> usize {
        self.ends.read().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ends.read().is_empty()
    }
}

impl CooldownStore for MemoryCooldowns {
    fn get(&self, actor: &ActorId) -> Option<DateTime<Utc>> {
        self.ends.read().get(actor).copied()
    }

    fn put(&self, actor: ActorId, until: DateTime<Utc>) {
        self.ends.write().insert(actor, until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn remaining_seconds_rounds_up() {
        let store = MemoryCooldowns::new();
        let actor = ActorId::new();
        store.put(actor, start() + Duration::milliseconds(4_200));
        assert_eq!(store.remaining_seconds(&actor, start()), Some(5));
        assert_eq!(
            store.remaining_seconds(&actor, start() + Duration::seconds(4)),
            Some(1)
        );
    }

    #[test]
    fn expired_entries_are_inert_but_kept() {
        let store = MemoryCooldowns::new();
        let actor = ActorId::new();
        store.put(actor, start());
        assert_eq!(store.remaining_seconds(&actor, start()), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.remaining_seconds(&ActorId::new(), start()), None);
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let clock = ManualClock::new(start());
        clock.advance(Duration::seconds(10));
        assert_eq!(clock.now(), start() + Duration::seconds(10));
        clock.set(start());
        assert_eq!(clock.now(), start());
    }
}
