use crate::agent::{AgentMetadata, AgentState};
use crate::agent_id::AgentId;
use crate::agent_runtime::AgentRuntime;
use crate::cancellation_token::CancellationToken;
use crate::error::Result;
use crate::message::AnyMessage;
use std::sync::Arc;

/// A handle to one agent id on one runtime.
///
/// Lets code outside any agent talk to a specific instance without holding
/// the runtime and id separately.
#[derive(Clone)]
pub struct AgentProxy {
    agent_id: AgentId,
    runtime: Arc<dyn AgentRuntime>,
}

impl AgentProxy {
    pub fn new(agent_id: AgentId, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { agent_id, runtime }
    }

    pub fn id(&self) -> &AgentId {
        &self.agent_id
    }

    pub async fn metadata(&self) -> Result<AgentMetadata> {
        self.runtime.agent_metadata(&self.agent_id).await
    }

    pub async fn send_message(
        &self,
        message: AnyMessage,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<Option<AnyMessage>> {
        self.runtime
            .send_message(message, self.agent_id.clone(), None, cancellation_token)
            .await
    }

    pub async fn save_state(&self) -> Result<AgentState> {
        self.runtime.agent_save_state(&self.agent_id).await
    }

    pub async fn load_state(&self, state: &AgentState) -> Result<()> {
        self.runtime.agent_load_state(&self.agent_id, state).await
    }
}

impl std::fmt::Debug for AgentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentProxy").field("id", &self.agent_id).finish()
    }
}
