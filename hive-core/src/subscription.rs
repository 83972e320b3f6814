use crate::agent_id::AgentId;
use crate::error::Result;
use crate::topic::TopicId;

/// Maps published topics to the agents that should receive them.
///
/// Implementations must be pure: `is_match` and `map_to_agent` are called
/// repeatedly for cache rebuilds and must return the same answers for the
/// same topic.
pub trait Subscription: Send + Sync {
    /// Stable unique id; the runtime keys installed subscriptions on it.
    fn id(&self) -> &str;

    /// Whether this subscription covers `topic`.
    fn is_match(&self, topic: &TopicId) -> bool;

    /// Resolves the recipient for a matching topic. Must fail for topics
    /// `is_match` rejects.
    fn map_to_agent(&self, topic: &TopicId) -> Result<AgentId>;
}

impl std::fmt::Debug for dyn Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id()).finish()
    }
}
