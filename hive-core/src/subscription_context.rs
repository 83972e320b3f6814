use crate::agent_id::AgentType;

tokio::task_local! {
    static SUBSCRIPTION_CONTEXT: AgentType;
}

/// Task-local agent type available while subscription factories run.
///
/// Registration helpers open this scope so that
/// [`crate::default_subscription::DefaultSubscription`] can pick up the
/// agent type being registered without the caller repeating it.
pub struct SubscriptionInstantiationContext;

impl SubscriptionInstantiationContext {
    pub async fn with_context<F, R>(agent_type: AgentType, f: F) -> R
    where
        F: std::future::Future<Output = R>,
    {
        SUBSCRIPTION_CONTEXT.scope(agent_type, f).await
    }

    /// The agent type currently being registered, or `None` outside a
    /// registration scope.
    pub fn agent_type() -> Option<AgentType> {
        SUBSCRIPTION_CONTEXT.try_with(|t| t.clone()).ok()
    }
}
