//! Crate-wide error type.
//!
//! Every fallible operation in the runtime returns [`Result`] with
//! [`HiveError`] as the error type, so callers can match on the exact
//! failure instead of parsing strings.

use crate::agent_id::AgentId;
use crate::topic::TopicId;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HiveError>;

/// All failure modes surfaced by the runtime and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    /// Agent type does not match `^[\w\-\.]+$`.
    #[error("invalid agent type: {0}. Allowed values MUST match the regex: `^[\\w\\-\\.]+$`")]
    InvalidAgentType(String),

    /// Topic type does not match `^[\w\-\.\:=]+$`.
    #[error("invalid topic type: {0}. Allowed values MUST match the regex: `^[\\w\\-\\.\\:=]+$`")]
    InvalidTopicType(String),

    /// A string could not be parsed as `type/key`.
    #[error("invalid agent id: {0}")]
    InvalidAgentId(String),

    /// A factory or instance is already registered under this agent type.
    #[error("agent type {0} already registered")]
    AgentTypeAlreadyRegistered(String),

    /// An agent instance already exists under this id.
    #[error("agent {0} already exists")]
    AgentAlreadyExists(AgentId),

    /// No factory is registered for this agent type.
    #[error("unknown agent type: {0}")]
    UnknownAgentType(String),

    /// A direct send reached an agent with no handler for the message type.
    #[error("agent {recipient} cannot handle message of type {message_type}")]
    UnhandledMessage {
        recipient: AgentId,
        message_type: String,
    },

    /// A subscription was asked to map a topic it does not match.
    #[error("subscription {subscription_id} cannot handle topic {topic}")]
    CantHandle {
        subscription_id: String,
        topic: TopicId,
    },

    /// A subscription with this id is already installed.
    #[error("subscription {0} already exists")]
    SubscriptionExists(String),

    /// No subscription with this id is installed.
    #[error("subscription {0} not found")]
    SubscriptionNotFound(String),

    /// The recipient's handler failed while serving an RPC.
    #[error("rpc to {recipient} failed: {reason}")]
    RpcFailed { recipient: AgentId, reason: String },

    /// The caller's cancellation token fired before the response arrived.
    #[error("operation cancelled")]
    Cancelled,

    /// An intervention handler dropped the message.
    #[error("message was dropped by an intervention handler")]
    MessageDropped,

    /// A handler registered for one delivery mode was invoked in the other.
    #[error("handler contract violation for {message_type}: {detail}")]
    HandlerContract {
        message_type: String,
        detail: String,
    },

    /// A handler for this message type is already in the dispatch table.
    #[error("handler for message type {0} already registered")]
    HandlerExists(String),

    /// Delivery targeted an agent that is already executing on this call stack.
    #[error("reentrant delivery to {0}")]
    ReentrantDelivery(AgentId),

    /// The topic type sits inside the reserved `rpc:` namespace.
    #[error("topic type {0} is reserved for rpc correlation")]
    ReservedTopicType(String),

    /// `load_state` found a saved agent whose type has no registered factory.
    #[error("saved state references agent type {0} with no registered factory")]
    StateFactoryMissing(String),

    /// The runtime has been stopped and no longer accepts work.
    #[error("runtime is stopped")]
    RuntimeStopped,

    /// `start` was called on a runtime that already started once.
    #[error("runtime already started")]
    AlreadyStarted,

    /// An agent outlived its runtime.
    #[error("runtime has been dropped")]
    RuntimeDropped,

    /// State snapshot (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything without a more precise variant.
    #[error("{0}")]
    Other(String),
}
