use crate::error::Result;
use crate::message::AnyMessage;
use crate::message_context::MessageContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;

/// Serializable snapshot of one agent's state.
pub type AgentState = HashMap<String, serde_json::Value>;

/// Descriptive identity of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub r#type: String,
    pub key: String,
    pub description: String,
}

/// The runtime-facing side of an agent.
///
/// The runtime owns every instance and delivers one message at a time, so
/// `on_message` gets `&mut self` without any internal locking. Most agents
/// implement [`crate::routing::TypeRouted`] and come wrapped in
/// [`crate::routing::RoutedAgent`] instead of implementing this directly.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &crate::agent_id::AgentId;

    fn metadata(&self) -> AgentMetadata;

    /// Handles one delivery. For RPC deliveries the returned message is the
    /// response; event deliveries return `None`.
    async fn on_message(
        &mut self,
        message: AnyMessage,
        ctx: &MessageContext,
    ) -> Result<Option<AnyMessage>>;

    /// Snapshot of this agent's state. Must be symmetric with
    /// [`Self::load_state`] and free of side effects.
    async fn save_state(&self) -> Result<AgentState> {
        Ok(AgentState::new())
    }

    /// Restores a snapshot produced by [`Self::save_state`].
    async fn load_state(&mut self, state: &AgentState) -> Result<()> {
        let _ = state;
        Ok(())
    }

    /// Escape hatch for typed access to the concrete agent.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
