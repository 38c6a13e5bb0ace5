//! Actor-facing notices.

use tracing::info;

use super::event::ActorId;

/// Delivers short notices (cooldown warnings, failure summaries) to actors.
pub trait Messenger: Send + Sync {
    /// Send `text` to `actor`.
    fn notify(&self, actor: ActorId, text: &str);
}

/// [`Messenger`] that only writes the notice to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMessenger;

impl Messenger for TracingMessenger {
    fn notify(&self, actor: ActorId, text: &str) {
        info!(target: "trigger", actor = %actor, "{}", text);
    }
}
