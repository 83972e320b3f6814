//! Hooks that run before messages enter the mailbox and before RPC
//! responses reach their caller.
//!
//! Useful for policy enforcement, auditing, and fault injection. A handler
//! may pass the message through (possibly rewritten) or drop it; a drop on
//! the send path resolves the pending caller with
//! [`crate::error::HiveError::MessageDropped`].

use crate::agent_id::AgentId;
use crate::message::AnyMessage;
use crate::topic::TopicId;
use async_trait::async_trait;

/// Returned by an intervention handler to swallow a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropMessage;

#[async_trait]
pub trait InterventionHandler: Send + Sync {
    /// Runs before a direct send is accepted.
    async fn on_send(
        &self,
        message: AnyMessage,
        sender: Option<&AgentId>,
        recipient: &AgentId,
    ) -> Result<AnyMessage, DropMessage> {
        let _ = (sender, recipient);
        Ok(message)
    }

    /// Runs before a publish is accepted.
    async fn on_publish(
        &self,
        message: AnyMessage,
        sender: Option<&AgentId>,
        topic_id: &TopicId,
    ) -> Result<AnyMessage, DropMessage> {
        let _ = (sender, topic_id);
        Ok(message)
    }

    /// Runs on an RPC response before it reaches the caller.
    async fn on_response(
        &self,
        message: AnyMessage,
        sender: &AgentId,
        recipient: Option<&AgentId>,
    ) -> Result<AnyMessage, DropMessage> {
        let _ = (sender, recipient);
        Ok(message)
    }
}

/// Pass-through handler; the default when none is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInterventionHandler;

#[async_trait]
impl InterventionHandler for DefaultInterventionHandler {}
