//! Agents defined by a single typed callback.
//!
//! Handy for the edges of a system: collectors that push results into a
//! channel, test doubles that serve canned responses, adapters that bridge
//! into non-agent code. The callback owns its captures; the contexts are
//! passed by value so callbacks stay free of borrow gymnastics.

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
use std::any::Any;
use std::sync::Arc;

/// Cheap clone of the agent's identity and runtime handle, passed into the
/// callback on every delivery.
#[derive(Clone)]
pub struct ClosureContext {
    base: Arc<BaseAgent>,
}

impl ClosureContext {
    pub fn id(&self) -> &AgentId {
        self.base.id()
    }

    pub async fn send_message(
        &self,
        message: AnyMessage,
        recipient: AgentId,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<Option<AnyMessage>> {
        self.base.send_message(message, recipient, cancellation_token).await
    }

    pub async fn publish_message(
        &self,
        message: AnyMessage,
        topic_id: TopicId,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        self.base.publish_message(message, topic_id, cancellation_token).await
    }
}

type Callback<M> = Arc<
    dyn Fn(ClosureContext, M, MessageContext) -> BoxFuture<'static, Result<Option<AnyMessage>>>
        + Send
        + Sync,
>;

/// An [`Agent`] whose entire behavior is one callback over messages of
/// type `M`. Any other message type is unhandled.
pub struct ClosureAgent<M> {
    context: ClosureContext,
    callback: Callback<M>,
}

impl<M> ClosureAgent<M>
where
    M: Any + Send + Sync + Clone + 'static,
{
    /// Registers a factory producing closure agents under `agent_type`.
    pub async fn register<F, Fut>(
        runtime: &dyn AgentRuntime,
        agent_type: &str,
        callback: F,
    ) -> Result<AgentType>
    where
        F: Fn(ClosureContext, M, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Option<AnyMessage>>> + Send + 'static,
    {
        let agent_type = AgentType::new(agent_type)?;
        let callback: Callback<M> =
            Arc::new(move |ctx, message, mctx| Box::pin(callback(ctx, message, mctx)));
        let factory: AgentFactory = Box::new(move || {
            let callback = callback.clone();
            Box::pin(async move {
                let base = BaseAgent::new("A closure agent")?;
                Ok(Box::new(ClosureAgent {
                    context: ClosureContext {
                        base: Arc::new(base),
                    },
                    callback,
                }) as Box<dyn Agent>)
            })
        });
        runtime.register_factory(agent_type, factory).await
    }

    /// [`Self::register`] plus subscriptions, built inside a registration
    /// scope so `DefaultSubscription` resolves the agent type.
    pub async fn register_with_subscriptions<F, Fut, S>(
        runtime: &dyn AgentRuntime,
        agent_type: &str,
        callback: F,
        subscriptions: S,
    ) -> Result<AgentType>
    where
        F: Fn(ClosureContext, M, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Option<AnyMessage>>> + Send + 'static,
        S: FnOnce() -> Result<Vec<Box<dyn Subscription>>>,
    {
        let agent_type = Self::register(runtime, agent_type, callback).await?;
        let built =
            SubscriptionInstantiationContext::with_context(agent_type.clone(), async move {
                subscriptions()
            })
            .await?;
        for subscription in built {
            runtime.add_subscription(subscription).await?;
        }
        Ok(agent_type)
    }
}

#[async_trait]
impl<M> Agent for ClosureAgent<M>
where
    M: Any + Send + Sync + Clone + 'static,
{
    fn id(&self) -> &AgentId {
        self.context.id()
    }

    fn metadata(&self) -> AgentMetadata {
        self.context.base.metadata()
    }

    async fn on_message(
        &mut self,
        message: AnyMessage,
        ctx: &MessageContext,
    ) -> Result<Option<AnyMessage>> {
        let Some(payload) = message.downcast::<M>() else {
            tracing::warn!(agent = %self.context.id(), "Unhandled message: {}", message.type_name());
            return Err(HiveError::UnhandledMessage {
                recipient: self.context.id().clone(),
                message_type: message.type_name().to_string(),
            });
        };
        (self.callback)(self.context.clone(), payload, ctx.clone()).await
    }

    async fn save_state(&self) -> Result<AgentState> {
        // Closure captures are opaque; there is nothing to snapshot.
        Ok(AgentState::new())
    }

    async fn load_state(&mut self, _state: &AgentState) -> Result<()> {
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
