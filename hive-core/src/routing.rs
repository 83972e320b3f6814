//! Type-routed dispatch.
//!
//! An agent's message handling is a dispatch table from concrete message
//! `TypeId` to an async handler over its state. The table is built once,
//! when the agent type is registered, so a missing or duplicate route is a
//! registration-time failure rather than a delivery-time surprise.
//!
//! Matching is exact: a handler for `M` receives exactly `M`, never some
//! other type convertible to it. A message made of alternatives registers
//! one route per alternative, typically pointing at a shared function.

use crate::agent::{Agent, AgentMetadata, AgentState};
use crate::agent_id::{AgentId, AgentType};
use crate::agent_runtime::{AgentFactory, AgentRuntime};
use crate::base_agent::BaseAgent;
use crate::cancellation_token::CancellationToken;
use crate::error::{HiveError, Result};
use crate::message::AnyMessage;
use crate::message_context::MessageContext;
use crate::subscription::Subscription;
use crate::subscription_context::SubscriptionInstantiationContext;
use crate::topic::TopicId;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// What the agent sees while a handler runs: its own identity and runtime
/// handle plus the delivery metadata.
pub struct AgentContext<'a> {
    agent: &'a BaseAgent,
    message: &'a MessageContext,
}

impl<'a> AgentContext<'a> {
    pub fn id(&self) -> &AgentId {
        self.agent.id()
    }

    pub fn message(&self) -> &MessageContext {
        self.message
    }

    pub fn sender(&self) -> Option<&AgentId> {
        self.message.sender.as_ref()
    }

    pub fn topic_id(&self) -> Option<&TopicId> {
        self.message.topic_id.as_ref()
    }

    pub fn is_rpc(&self) -> bool {
        self.message.is_rpc
    }

    pub fn message_id(&self) -> &str {
        &self.message.message_id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.message.cancellation_token
    }

    /// Sends with this agent as sender, propagating the current token.
    pub async fn send_message(
        &self,
        message: AnyMessage,
        recipient: AgentId,
    ) -> Result<Option<AnyMessage>> {
        self.agent
            .send_message(message, recipient, Some(self.message.cancellation_token.clone()))
            .await
    }

    /// Publishes with this agent as sender, propagating the current token.
    pub async fn publish_message(&self, message: AnyMessage, topic_id: TopicId) -> Result<()> {
        self.agent
            .publish_message(message, topic_id, Some(self.message.cancellation_token.clone()))
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerKind {
    Event,
    Rpc,
}

type HandlerFn<A> = Box<
    dyn for<'a> Fn(
            &'a mut A,
            AnyMessage,
            &'a AgentContext<'a>,
        ) -> BoxFuture<'a, Result<Option<AnyMessage>>>
        + Send
        + Sync,
>;

struct HandlerEntry<A> {
    kind: HandlerKind,
    type_name: &'static str,
    handler: HandlerFn<A>,
}

/// Dispatch table for agents with state `A`.
pub struct HandlerRegistry<A> {
    entries: HashMap<TypeId, HandlerEntry<A>>,
}

impl<A: Send + 'static> Default for HandlerRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Send + 'static> HandlerRegistry<A> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Routes messages of type `M` to an event handler. Event handlers
    /// never produce a response.
    pub fn on_event<M, F>(&mut self, handler: F) -> Result<&mut Self>
    where
        M: Any + Send + Sync + Clone + 'static,
        F: for<'a> Fn(&'a mut A, M, &'a AgentContext<'a>) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        let erased: HandlerFn<A> = Box::new(move |state, message, ctx| {
            match message.downcast::<M>() {
                Some(payload) => {
                    let fut = handler(state, payload, ctx);
                    Box::pin(async move { fut.await.map(|()| None) })
                }
                None => Box::pin(async move {
                    Err(HiveError::HandlerContract {
                        message_type: std::any::type_name::<M>().to_string(),
                        detail: "payload does not match the routed type".to_string(),
                    })
                }),
            }
        });
        self.insert::<M>(HandlerKind::Event, erased)
    }

    /// Routes messages of type `M` to an RPC handler producing `R`.
    pub fn on_rpc<M, R, F>(&mut self, handler: F) -> Result<&mut Self>
    where
        M: Any + Send + Sync + Clone + 'static,
        R: Any + Send + Sync + 'static,
        F: for<'a> Fn(&'a mut A, M, &'a AgentContext<'a>) -> BoxFuture<'a, Result<R>>
            + Send
            + Sync
            + 'static,
    {
        let erased: HandlerFn<A> = Box::new(move |state, message, ctx| {
            match message.downcast::<M>() {
                Some(payload) => {
                    let fut = handler(state, payload, ctx);
                    Box::pin(async move { fut.await.map(|r| Some(AnyMessage::new(r))) })
                }
                None => Box::pin(async move {
                    Err(HiveError::HandlerContract {
                        message_type: std::any::type_name::<M>().to_string(),
                        detail: "payload does not match the routed type".to_string(),
                    })
                }),
            }
        });
        self.insert::<M>(HandlerKind::Rpc, erased)
    }

    fn insert<M: Any>(&mut self, kind: HandlerKind, handler: HandlerFn<A>) -> Result<&mut Self> {
        let type_name = std::any::type_name::<M>();
        match self.entries.entry(TypeId::of::<M>()) {
            Entry::Occupied(_) => Err(HiveError::HandlerExists(type_name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(HandlerEntry {
                    kind,
                    type_name,
                    handler,
                });
                Ok(self)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State types that dispatch by message type.
///
/// `routes` is called once per instantiation; the state hooks back the
/// runtime's save/load surface and must be symmetric.
pub trait TypeRouted: Sized + Send + Sync + 'static {
    fn routes() -> Result<HandlerRegistry<Self>>;

    fn save_state(&self) -> Result<AgentState> {
        Ok(AgentState::new())
    }

    fn load_state(&mut self, state: &AgentState) -> Result<()> {
        let _ = state;
        Ok(())
    }
}

/// [`Agent`] adapter around a [`TypeRouted`] state.
pub struct RoutedAgent<A: TypeRouted> {
    base: BaseAgent,
    state: A,
    registry: HandlerRegistry<A>,
}

impl<A: TypeRouted> RoutedAgent<A> {
    /// Builds the adapter. Must run inside a factory call so the base can
    /// bind to the instantiating runtime.
    pub fn new(state: A, description: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base: BaseAgent::new(description)?,
            state,
            registry: A::routes()?,
        })
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut A {
        &mut self.state
    }
}

#[async_trait]
impl<A: TypeRouted> Agent for RoutedAgent<A> {
    fn id(&self) -> &AgentId {
        self.base.id()
    }

    fn metadata(&self) -> AgentMetadata {
        self.base.metadata()
    }

    async fn on_message(
        &mut self,
        message: AnyMessage,
        ctx: &MessageContext,
    ) -> Result<Option<AnyMessage>> {
        let Some(entry) = self.registry.entries.get(&message.type_id()) else {
            tracing::warn!(agent = %self.base.id(), "Unhandled message: {}", message.type_name());
            return Err(HiveError::UnhandledMessage {
                recipient: self.base.id().clone(),
                message_type: message.type_name().to_string(),
            });
        };
        match (entry.kind, ctx.is_rpc) {
            (HandlerKind::Rpc, false) => Err(HiveError::HandlerContract {
                message_type: entry.type_name.to_string(),
                detail: "rpc handler invoked for an event delivery".to_string(),
            }),
            (HandlerKind::Event, true) => Err(HiveError::HandlerContract {
                message_type: entry.type_name.to_string(),
                detail: "event handler cannot produce an rpc response".to_string(),
            }),
            _ => {
                let agent_ctx = AgentContext {
                    agent: &self.base,
                    message: ctx,
                };
                (entry.handler)(&mut self.state, message, &agent_ctx).await
            }
        }
    }

    async fn save_state(&self) -> Result<AgentState> {
        TypeRouted::save_state(&self.state)
    }

    async fn load_state(&mut self, state: &AgentState) -> Result<()> {
        TypeRouted::load_state(&mut self.state, state)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registers a factory that builds `RoutedAgent<A>` instances on demand.
pub async fn register_routed<A, F>(
    runtime: &dyn AgentRuntime,
    agent_type: &str,
    description: &str,
    make_state: F,
) -> Result<AgentType>
where
    A: TypeRouted,
    F: Fn() -> A + Send + Sync + 'static,
{
    let agent_type = AgentType::new(agent_type)?;
    let description: Arc<str> = Arc::from(description);
    let make_state = Arc::new(make_state);
    let factory: AgentFactory = Box::new(move || {
        let make_state = make_state.clone();
        let description = description.clone();
        Box::pin(async move {
            let agent = RoutedAgent::new(make_state(), description.as_ref())?;
            Ok(Box::new(agent) as Box<dyn Agent>)
        })
    });
    runtime.register_factory(agent_type, factory).await
}

/// [`register_routed`] plus subscriptions, built inside a registration
/// scope so [`crate::default_subscription::DefaultSubscription`] can pick
/// up the agent type.
pub async fn register_routed_with_subscriptions<A, F, S>(
    runtime: &dyn AgentRuntime,
    agent_type: &str,
    description: &str,
    make_state: F,
    subscriptions: S,
) -> Result<AgentType>
where
    A: TypeRouted,
    F: Fn() -> A + Send + Sync + 'static,
    S: FnOnce() -> Result<Vec<Box<dyn Subscription>>>,
{
    let agent_type = register_routed(runtime, agent_type, description, make_state).await?;
    let built = SubscriptionInstantiationContext::with_context(agent_type.clone(), async move {
        subscriptions()
    })
    .await?;
    for subscription in built {
        runtime.add_subscription(subscription).await?;
    }
    Ok(agent_type)
}
