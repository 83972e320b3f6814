use crate::agent_id::AgentId;
use crate::cancellation_token::CancellationToken;
use crate::topic::TopicId;
use serde::{Deserialize, Serialize};

/// Per-delivery metadata handed to a handler alongside the message.
///
/// Built fresh by the runtime for every delivery and never stored; `sender`
/// is `None` for messages injected from outside any agent, `topic_id` is
/// `None` for direct sends, and `is_rpc` is true exactly when a response is
/// awaited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContext {
    pub sender: Option<AgentId>,
    pub topic_id: Option<TopicId>,
    pub is_rpc: bool,
    pub cancellation_token: CancellationToken,
    pub message_id: String,
}

impl MessageContext {
    pub fn direct(
        sender: Option<AgentId>,
        cancellation_token: CancellationToken,
        message_id: String,
    ) -> Self {
        Self {
            sender,
            topic_id: None,
            is_rpc: true,
            cancellation_token,
            message_id,
        }
    }

    pub fn published(
        sender: Option<AgentId>,
        topic_id: TopicId,
        cancellation_token: CancellationToken,
        message_id: String,
    ) -> Self {
        Self {
            sender,
            topic_id: Some(topic_id),
            is_rpc: false,
            cancellation_token,
            message_id,
        }
    }
}
