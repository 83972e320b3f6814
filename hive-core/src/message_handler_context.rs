use crate::agent_id::AgentId;

tokio::task_local! {
    static MESSAGE_HANDLER_CONTEXT: AgentId;
}

/// Task-local view of which agent is currently handling a message.
///
/// The runtime opens this scope around every delivery. Collaborators use it
/// to detect they are running inside a handler: [`crate::topic::DefaultTopicId`]
/// defaults the source to the current agent's key, and the runtime routes
/// nested sends inline instead of through the mailbox.
pub struct MessageHandlerContext;

impl MessageHandlerContext {
    /// Populates the handler context for the duration of the given future.
    pub async fn with_context<F, R>(agent_id: AgentId, f: F) -> R
    where
        F: std::future::Future<Output = R>,
    {
        MESSAGE_HANDLER_CONTEXT.scope(agent_id, f).await
    }

    /// The id of the agent currently handling a message, or `None` when not
    /// called from inside a handler.
    pub fn agent_id() -> Option<AgentId> {
        MESSAGE_HANDLER_CONTEXT.try_with(|id| id.clone()).ok()
    }

    pub fn is_in_handler() -> bool {
        MESSAGE_HANDLER_CONTEXT.try_with(|_| {}).is_ok()
    }
}
