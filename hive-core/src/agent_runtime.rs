use crate::agent::{Agent, AgentMetadata, AgentState};
use crate::agent_id::{AgentId, AgentType};
use crate::cancellation_token::CancellationToken;
use crate::error::Result;
use crate::message::AnyMessage;
use crate::subscription::Subscription;
use crate::topic::TopicId;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;

/// Produces one agent instance per invocation. Called lazily, at most once
/// per [`AgentId`], inside an
/// [`crate::agent_instantiation::AgentInstantiationContext`] scope.
pub type AgentFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Box<dyn Agent>>> + Send + Sync>;

/// The substrate agents live on.
///
/// [`crate::single_threaded_agent_runtime::SingleThreadedAgentRuntime`] is
/// the in-process implementation; a distributed transport can sit behind
/// the same contract.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Point-to-point call. Resolves with the recipient handler's response
    /// once it has run to completion.
    async fn send_message(
        &self,
        message: AnyMessage,
        recipient: AgentId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<Option<AnyMessage>>;

    /// Broadcast to every agent subscribed to `topic_id`. Resolves when the
    /// message is accepted for delivery, not when handlers finish.
    async fn publish_message(
        &self,
        message: AnyMessage,
        topic_id: TopicId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()>;

    /// Registers a factory under an agent type. Instances are created
    /// lazily when a message first targets an id of this type.
    async fn register_factory(&self, agent_type: AgentType, factory: AgentFactory)
        -> Result<AgentType>;

    /// Installs a pre-built instance under a fixed id.
    async fn register_agent_instance(&self, agent: Box<dyn Agent>, id: AgentId) -> Result<AgentId>;

    async fn add_subscription(&self, subscription: Box<dyn Subscription>) -> Result<()>;

    async fn remove_subscription(&self, id: &str) -> Result<()>;

    /// Metadata for an id, instantiating the agent if needed.
    async fn agent_metadata(&self, agent_id: &AgentId) -> Result<AgentMetadata>;

    async fn agent_save_state(&self, agent_id: &AgentId) -> Result<AgentState>;

    async fn agent_load_state(&self, agent_id: &AgentId, state: &AgentState) -> Result<()>;

    /// Snapshot of every instantiated agent, keyed by `AgentId` string form.
    async fn save_state(&self) -> Result<HashMap<String, AgentState>>;

    /// Restores a snapshot produced by [`Self::save_state`]. Fails before
    /// touching anything if a saved agent type has no registered factory.
    async fn load_state(&self, state: &HashMap<String, AgentState>) -> Result<()>;

    /// Envelopes accepted but not yet fully delivered.
    fn unprocessed_messages_count(&self) -> usize;
}
