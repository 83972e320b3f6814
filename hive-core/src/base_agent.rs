use crate::agent::AgentMetadata;
use crate::agent_id::AgentId;
use crate::agent_instantiation::AgentInstantiationContext;
use crate::agent_runtime::AgentRuntime;
use crate::cancellation_token::CancellationToken;
use crate::error::{HiveError, Result};
use crate::message::AnyMessage;
use crate::topic::TopicId;
use std::sync::{Arc, Weak};

/// Identity plus a weak handle back to the owning runtime.
///
/// Constructed only inside a factory call, where the runtime's
/// instantiation scope supplies the id and the handle. The handle is weak:
/// agents are owned by the runtime and must not keep it alive.
pub struct BaseAgent {
    id: AgentId,
    description: String,
    runtime: Weak<dyn AgentRuntime>,
}

impl BaseAgent {
    pub fn new(description: impl Into<String>) -> Result<Self> {
        let id = AgentInstantiationContext::current_agent_id().ok_or_else(|| {
            HiveError::Other(
                "BaseAgent can only be constructed inside an agent factory call".to_string(),
            )
        })?;
        let runtime = AgentInstantiationContext::current_runtime().ok_or_else(|| {
            HiveError::Other(
                "BaseAgent can only be constructed inside an agent factory call".to_string(),
            )
        })?;
        Ok(Self {
            id,
            description: description.into(),
            runtime,
        })
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn metadata(&self) -> AgentMetadata {
        AgentMetadata {
            r#type: self.id.r#type.clone(),
            key: self.id.key.clone(),
            description: self.description.clone(),
        }
    }

    pub fn runtime(&self) -> Result<Arc<dyn AgentRuntime>> {
        self.runtime.upgrade().ok_or(HiveError::RuntimeDropped)
    }

    /// Point-to-point call with this agent as the sender.
    pub async fn send_message(
        &self,
        message: AnyMessage,
        recipient: AgentId,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<Option<AnyMessage>> {
        self.runtime()?
            .send_message(message, recipient, Some(self.id.clone()), cancellation_token)
            .await
    }

    /// Broadcast with this agent as the sender.
    pub async fn publish_message(
        &self,
        message: AnyMessage,
        topic_id: TopicId,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        self.runtime()?
            .publish_message(message, topic_id, Some(self.id.clone()), cancellation_token)
            .await
    }

    pub async fn remove_subscription(&self, id: &str) -> Result<()> {
        self.runtime()?.remove_subscription(id).await
    }
}

impl std::fmt::Debug for BaseAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseAgent")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish()
    }
}
