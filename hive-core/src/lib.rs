//! # Hive Core
//!
//! A single-threaded, in-process agent runtime with type-routed message
//! dispatch. Agents are identified by `type/key`, instantiated lazily from
//! registered factories, and talk over two channels on one substrate:
//! broadcast publish/subscribe and point-to-point RPC.
//!
//! One scheduler task delivers one message at a time, so handlers take
//! `&mut self` and agent state needs no locks.
//!
//! ## Quick Start
//!
//! ```rust
//! use hive_core::{AgentId, TopicId, CancellationToken};
//!
//! let agent_id = AgentId::new("assistant", "main").unwrap();
//! assert_eq!(agent_id.r#type(), "assistant");
//! assert_eq!(agent_id.key(), "main");
//!
//! let topic_id = TopicId::new("user.message", "session-1").unwrap();
//! assert_eq!(topic_id.to_string(), "user.message@session-1");
//!
//! let token = CancellationToken::new();
//! assert!(!token.is_cancelled());
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub mod agent;
pub mod agent_id;
pub mod agent_instantiation;
pub mod agent_proxy;
pub mod agent_runtime;
pub mod base_agent;
pub mod cancellation_token;
pub mod closure_agent;
pub mod default_subscription;
pub mod intervention;
pub mod message;
pub mod message_context;
pub mod message_handler_context;
pub mod routing;
pub mod rpc;
pub mod single_threaded_agent_runtime;
pub mod subscription;
pub mod subscription_context;
pub mod topic;
pub mod type_subscription;

mod subscription_manager;

pub use agent::{Agent, AgentMetadata, AgentState};
pub use agent_id::{AgentId, AgentType};
pub use agent_instantiation::AgentInstantiationContext;
pub use agent_proxy::AgentProxy;
pub use agent_runtime::{AgentFactory, AgentRuntime};
pub use base_agent::BaseAgent;
pub use cancellation_token::CancellationToken;
pub use closure_agent::{ClosureAgent, ClosureContext};
pub use default_subscription::DefaultSubscription;
pub use error::{HiveError, Result};
pub use intervention::{DefaultInterventionHandler, DropMessage, InterventionHandler};
pub use message::AnyMessage;
pub use message_context::MessageContext;
pub use message_handler_context::MessageHandlerContext;
pub use routing::{
    register_routed, register_routed_with_subscriptions, AgentContext, HandlerRegistry,
    RoutedAgent, TypeRouted,
};
pub use single_threaded_agent_runtime::SingleThreadedAgentRuntime;
pub use subscription::Subscription;
pub use subscription_context::SubscriptionInstantiationContext;
pub use topic::{DefaultTopicId, TopicId};
pub use type_subscription::TypeSubscription;
