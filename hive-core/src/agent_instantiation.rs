use crate::agent_id::AgentId;
use crate::agent_runtime::AgentRuntime;
use std::sync::Weak;

tokio::task_local! {
    static AGENT_INSTANTIATION_CONTEXT: (Weak<dyn AgentRuntime>, AgentId);
}

/// Task-local scope the runtime opens around every factory call.
///
/// Inside it, agent constructors can learn their own id and hold a weak
/// handle to the runtime that is creating them. The handle is weak so that
/// runtime-owned agents never keep the runtime alive.
pub struct AgentInstantiationContext;

impl AgentInstantiationContext {
    pub async fn with_context<F, R>(
        runtime: Weak<dyn AgentRuntime>,
        agent_id: AgentId,
        f: F,
    ) -> R
    where
        F: std::future::Future<Output = R>,
    {
        AGENT_INSTANTIATION_CONTEXT.scope((runtime, agent_id), f).await
    }

    /// The runtime performing the instantiation, or `None` outside a
    /// factory call.
    pub fn current_runtime() -> Option<Weak<dyn AgentRuntime>> {
        AGENT_INSTANTIATION_CONTEXT.try_with(|ctx| ctx.0.clone()).ok()
    }

    /// The id being instantiated, or `None` outside a factory call.
    pub fn current_agent_id() -> Option<AgentId> {
        AGENT_INSTANTIATION_CONTEXT.try_with(|ctx| ctx.1.clone()).ok()
    }

    pub fn is_in_factory_call() -> bool {
        AGENT_INSTANTIATION_CONTEXT.try_with(|_| {}).is_ok()
    }
}
