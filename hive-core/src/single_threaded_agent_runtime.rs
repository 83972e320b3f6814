//! The in-process runtime.
//!
//! One scheduler task drains an explicit mailbox and runs exactly one
//! handler at a time, so agents mutate their state without locks. A direct
//! send issued from inside a running handler is dispatched inline on the
//! same call stack; everything else flows through the mailbox in FIFO
//! order.
//!
//! Agents are owned by the runtime in an arena keyed by [`AgentId`]. A slot
//! is checked out for the duration of a delivery and checked back in
//! afterwards, which also turns delivery to an agent already on the call
//! stack into an error instead of a deadlock.

use crate::agent::{Agent, AgentMetadata, AgentState};
use crate::agent_id::{AgentId, AgentType};
use crate::agent_instantiation::AgentInstantiationContext;
use crate::agent_proxy::AgentProxy;
use crate::agent_runtime::{AgentFactory, AgentRuntime};
use crate::cancellation_token::CancellationToken;
use crate::error::{HiveError, Result};
use crate::intervention::{DefaultInterventionHandler, DropMessage, InterventionHandler};
use crate::message::AnyMessage;
use crate::message_context::MessageContext;
use crate::message_handler_context::MessageHandlerContext;
use crate::rpc::is_rpc_topic;
use crate::subscription::Subscription;
use crate::subscription_manager::SubscriptionManager;
use crate::topic::TopicId;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

type SharedFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<Box<dyn Agent>>> + Send + Sync>;

enum MessageEnvelope {
    Send {
        message: AnyMessage,
        sender: Option<AgentId>,
        recipient: AgentId,
        response_tx: oneshot::Sender<Result<Option<AnyMessage>>>,
        cancellation_token: CancellationToken,
        message_id: String,
    },
    Publish {
        message: AnyMessage,
        sender: Option<AgentId>,
        topic_id: TopicId,
        /// Resolved when the publish is accepted, so subscription changes
        /// made afterwards do not affect messages already in the mailbox.
        recipients: Vec<AgentId>,
        cancellation_token: CancellationToken,
        message_id: String,
    },
}

enum AgentSlot {
    Idle(Box<dyn Agent>),
    /// Checked out for a delivery, or reserved while a factory runs.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Started,
    Stopped,
}

#[derive(Default)]
struct RuntimeState {
    factories: HashMap<String, SharedFactory>,
    agents: HashMap<AgentId, AgentSlot>,
    subscriptions: SubscriptionManager,
}

struct RuntimeCore {
    state: Mutex<RuntimeState>,
    mailbox_tx: mpsc::UnboundedSender<MessageEnvelope>,
    mailbox_rx: Mutex<Option<mpsc::UnboundedReceiver<MessageEnvelope>>>,
    /// Envelopes accepted but not yet fully delivered. Nested publishes
    /// raise it before the enclosing delivery completes, so reaching zero
    /// means the whole cascade has drained.
    pending: AtomicUsize,
    idle_notify: Notify,
    shutdown: CancellationToken,
    status: Mutex<Lifecycle>,
    run_handle: Mutex<Option<JoinHandle<()>>>,
    intervention: Mutex<Arc<dyn InterventionHandler>>,
    self_ref: Weak<RuntimeCore>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Errors produced while the recipient ran, tagged so callers can tell a
/// failed call from a failed dispatch.
fn tag_rpc_failure(recipient: &AgentId, err: HiveError) -> HiveError {
    match err {
        e @ (HiveError::UnhandledMessage { .. }
        | HiveError::HandlerContract { .. }
        | HiveError::ReentrantDelivery(_)
        | HiveError::UnknownAgentType(_)
        | HiveError::Cancelled
        | HiveError::MessageDropped) => e,
        e => HiveError::RpcFailed {
            recipient: recipient.clone(),
            reason: e.to_string(),
        },
    }
}

impl RuntimeCore {
    fn intervention(&self) -> Arc<dyn InterventionHandler> {
        lock(&self.intervention).clone()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if *lock(&self.status) == Lifecycle::Stopped {
            return Err(HiveError::RuntimeStopped);
        }
        Ok(())
    }

    fn enqueue(&self, envelope: MessageEnvelope) -> Result<()> {
        // Raise pending before handing the envelope over; the scheduler
        // decrements only after a full delivery.
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.mailbox_tx.send(envelope).is_err() {
            if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.idle_notify.notify_waiters();
            }
            return Err(HiveError::RuntimeStopped);
        }
        Ok(())
    }

    /// Takes the agent out of its slot, instantiating it on first use.
    async fn checkout(&self, id: &AgentId) -> Result<Box<dyn Agent>> {
        let factory = {
            let mut state = lock(&self.state);
            match state.agents.get_mut(id) {
                Some(slot) => match std::mem::replace(slot, AgentSlot::Busy) {
                    AgentSlot::Idle(agent) => return Ok(agent),
                    AgentSlot::Busy => return Err(HiveError::ReentrantDelivery(id.clone())),
                },
                None => {
                    let Some(factory) = state.factories.get(id.r#type()) else {
                        return Err(HiveError::UnknownAgentType(id.r#type().to_string()));
                    };
                    let factory = factory.clone();
                    // Reserve the slot so the factory runs at most once
                    // per id even if instantiation is re-entered.
                    state.agents.insert(id.clone(), AgentSlot::Busy);
                    factory
                }
            }
        };
        let runtime: Weak<dyn AgentRuntime> = self.self_ref.clone();
        let created =
            AgentInstantiationContext::with_context(runtime, id.clone(), factory()).await;
        match created {
            Ok(agent) => Ok(agent),
            Err(e) => {
                lock(&self.state).agents.remove(id);
                Err(e)
            }
        }
    }

    fn checkin(&self, id: AgentId, agent: Box<dyn Agent>) {
        lock(&self.state).agents.insert(id, AgentSlot::Idle(agent));
    }

    /// Runs one delivery to completion, with the handler context open.
    async fn deliver(
        &self,
        message: AnyMessage,
        recipient: &AgentId,
        ctx: &MessageContext,
    ) -> Result<Option<AnyMessage>> {
        let mut agent = self.checkout(recipient).await?;
        let result =
            MessageHandlerContext::with_context(recipient.clone(), agent.on_message(message, ctx))
                .await;
        self.checkin(recipient.clone(), agent);
        result
    }

    async fn finish_rpc(
        &self,
        result: Result<Option<AnyMessage>>,
        recipient: &AgentId,
        sender: Option<&AgentId>,
        handler: &dyn InterventionHandler,
    ) -> Result<Option<AnyMessage>> {
        match result {
            Ok(Some(response)) => match handler.on_response(response, recipient, sender).await {
                Ok(response) => Ok(Some(response)),
                Err(DropMessage) => Err(HiveError::MessageDropped),
            },
            Ok(None) => Ok(None),
            Err(e) => Err(tag_rpc_failure(recipient, e)),
        }
    }

    async fn process(&self, envelope: MessageEnvelope) {
        match envelope {
            MessageEnvelope::Send {
                message,
                sender,
                recipient,
                response_tx,
                cancellation_token,
                message_id,
            } => {
                let ctx = MessageContext::direct(sender.clone(), cancellation_token, message_id);
                let result = self.deliver(message, &recipient, &ctx).await;
                let handler = self.intervention();
                let outcome = self
                    .finish_rpc(result, &recipient, sender.as_ref(), handler.as_ref())
                    .await;
                // The caller may have given up (cancellation); that is fine.
                let _ = response_tx.send(outcome);
            }
            MessageEnvelope::Publish {
                message,
                sender,
                topic_id,
                recipients,
                cancellation_token,
                message_id,
            } => {
                for recipient in recipients {
                    if sender.as_ref() == Some(&recipient) {
                        continue;
                    }
                    let ctx = MessageContext::published(
                        sender.clone(),
                        topic_id.clone(),
                        cancellation_token.clone(),
                        message_id.clone(),
                    );
                    // One failing recipient never blocks the rest.
                    if let Err(e) = self.deliver(message.clone(), &recipient, &ctx).await {
                        tracing::warn!(recipient = %recipient, error = %e, "event delivery failed");
                    }
                }
            }
        }
    }
}

#[async_trait]
impl AgentRuntime for RuntimeCore {
    async fn send_message(
        &self,
        message: AnyMessage,
        recipient: AgentId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<Option<AnyMessage>> {
        self.ensure_accepting()?;
        let token = cancellation_token.unwrap_or_default();
        token.check_cancelled()?;
        let handler = self.intervention();
        let message = handler
            .on_send(message, sender.as_ref(), &recipient)
            .await
            .map_err(|DropMessage| HiveError::MessageDropped)?;
        let message_id = Uuid::new_v4().to_string();

        if MessageHandlerContext::is_in_handler() {
            // Nested call from inside a handler: dispatch depth-first on
            // this stack, otherwise the single scheduler task would wait
            // on itself.
            let ctx = MessageContext::direct(sender.clone(), token, message_id);
            let result = self.deliver(message, &recipient, &ctx).await;
            return self
                .finish_rpc(result, &recipient, sender.as_ref(), handler.as_ref())
                .await;
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.enqueue(MessageEnvelope::Send {
            message,
            sender,
            recipient,
            response_tx,
            cancellation_token: token.clone(),
            message_id,
        })?;
        tokio::select! {
            _ = token.cancelled() => Err(HiveError::Cancelled),
            response = response_rx => match response {
                Ok(outcome) => outcome,
                Err(_) => Err(HiveError::RuntimeStopped),
            },
        }
    }

    async fn publish_message(
        &self,
        message: AnyMessage,
        topic_id: TopicId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        self.ensure_accepting()?;
        if is_rpc_topic(topic_id.r#type()) {
            return Err(HiveError::ReservedTopicType(topic_id.r#type().to_string()));
        }
        let token = cancellation_token.unwrap_or_default();
        token.check_cancelled()?;
        let message = match self
            .intervention()
            .on_publish(message, sender.as_ref(), &topic_id)
            .await
        {
            Ok(message) => message,
            Err(DropMessage) => {
                tracing::debug!(topic = %topic_id, "publish dropped by intervention handler");
                return Ok(());
            }
        };
        // Resolve now: the recipient set is fixed at accept time so that a
        // later subscription change cannot retract a delivery the caller
        // was already promised.
        let recipients = lock(&self.state)
            .subscriptions
            .subscribed_recipients(&topic_id)?
            .to_vec();
        self.enqueue(MessageEnvelope::Publish {
            message,
            sender,
            topic_id,
            recipients,
            cancellation_token: token,
            message_id: Uuid::new_v4().to_string(),
        })
    }

    async fn register_factory(
        &self,
        agent_type: AgentType,
        factory: AgentFactory,
    ) -> Result<AgentType> {
        let mut state = lock(&self.state);
        if state.factories.contains_key(agent_type.as_str()) {
            return Err(HiveError::AgentTypeAlreadyRegistered(
                agent_type.as_str().to_string(),
            ));
        }
        state
            .factories
            .insert(agent_type.as_str().to_string(), Arc::from(factory));
        Ok(agent_type)
    }

    async fn register_agent_instance(
        &self,
        agent: Box<dyn Agent>,
        id: AgentId,
    ) -> Result<AgentId> {
        if agent.id() != &id {
            return Err(HiveError::Other(format!(
                "instance reports id {} but was registered as {}",
                agent.id(),
                id
            )));
        }
        let mut state = lock(&self.state);
        if state.agents.contains_key(&id) {
            return Err(HiveError::AgentAlreadyExists(id));
        }
        state.agents.insert(id.clone(), AgentSlot::Idle(agent));
        Ok(id)
    }

    async fn add_subscription(&self, subscription: Box<dyn Subscription>) -> Result<()> {
        lock(&self.state).subscriptions.add_subscription(subscription)
    }

    async fn remove_subscription(&self, id: &str) -> Result<()> {
        lock(&self.state).subscriptions.remove_subscription(id)
    }

    async fn agent_metadata(&self, agent_id: &AgentId) -> Result<AgentMetadata> {
        let agent = self.checkout(agent_id).await?;
        let metadata = agent.metadata();
        self.checkin(agent_id.clone(), agent);
        Ok(metadata)
    }

    async fn agent_save_state(&self, agent_id: &AgentId) -> Result<AgentState> {
        let agent = self.checkout(agent_id).await?;
        let snapshot = agent.save_state().await;
        self.checkin(agent_id.clone(), agent);
        snapshot
    }

    async fn agent_load_state(&self, agent_id: &AgentId, state: &AgentState) -> Result<()> {
        let mut agent = self.checkout(agent_id).await?;
        let outcome = agent.load_state(state).await;
        self.checkin(agent_id.clone(), agent);
        outcome
    }

    async fn save_state(&self) -> Result<HashMap<String, AgentState>> {
        let ids: Vec<AgentId> = lock(&self.state).agents.keys().cloned().collect();
        let mut snapshot = HashMap::new();
        for id in ids {
            let state = self.agent_save_state(&id).await?;
            snapshot.insert(id.to_string(), state);
        }
        Ok(snapshot)
    }

    async fn load_state(&self, snapshot: &HashMap<String, AgentState>) -> Result<()> {
        // Validate every entry before touching any agent.
        {
            let state = lock(&self.state);
            for key in snapshot.keys() {
                let id: AgentId = key.parse()?;
                if !state.agents.contains_key(&id)
                    && !state.factories.contains_key(id.r#type())
                {
                    return Err(HiveError::StateFactoryMissing(id.r#type().to_string()));
                }
            }
        }
        for (key, saved) in snapshot {
            let id: AgentId = key.parse()?;
            self.agent_load_state(&id, saved).await?;
        }
        Ok(())
    }

    fn unprocessed_messages_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// In-process [`AgentRuntime`] with a single sequential scheduler.
///
/// Cheap to clone; clones share the runtime. The lifecycle is start-once:
/// after [`Self::stop`] the runtime rejects further work and cannot be
/// restarted.
#[derive(Clone)]
pub struct SingleThreadedAgentRuntime {
    core: Arc<RuntimeCore>,
}

impl Default for SingleThreadedAgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleThreadedAgentRuntime {
    pub fn new() -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let core = Arc::new_cyclic(|self_ref| RuntimeCore {
            state: Mutex::new(RuntimeState::default()),
            mailbox_tx,
            mailbox_rx: Mutex::new(Some(mailbox_rx)),
            pending: AtomicUsize::new(0),
            idle_notify: Notify::new(),
            shutdown: CancellationToken::new(),
            status: Mutex::new(Lifecycle::Created),
            run_handle: Mutex::new(None),
            intervention: Mutex::new(Arc::new(DefaultInterventionHandler)),
            self_ref: self_ref.clone(),
        });
        Self { core }
    }

    /// Installs the intervention handler. Takes effect for messages
    /// accepted after the call.
    pub fn set_intervention_handler(&self, handler: Arc<dyn InterventionHandler>) {
        *lock(&self.core.intervention) = handler;
    }

    /// Spawns the scheduler task. Messages may be enqueued before this;
    /// they are delivered once the scheduler runs.
    pub fn start(&self) -> Result<()> {
        {
            let mut status = lock(&self.core.status);
            match *status {
                Lifecycle::Created => *status = Lifecycle::Started,
                Lifecycle::Started => return Err(HiveError::AlreadyStarted),
                Lifecycle::Stopped => return Err(HiveError::RuntimeStopped),
            }
        }
        let mut rx = match lock(&self.core.mailbox_rx).take() {
            Some(rx) => rx,
            None => return Err(HiveError::AlreadyStarted),
        };
        let core = self.core.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = core.shutdown.cancelled() => break,
                    maybe = rx.recv() => match maybe {
                        Some(envelope) => {
                            core.process(envelope).await;
                            if core.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                                core.idle_notify.notify_waiters();
                            }
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!("scheduler stopped");
        });
        *lock(&self.core.run_handle) = Some(handle);
        Ok(())
    }

    /// Stops after the in-flight delivery finishes. Envelopes still queued
    /// are abandoned.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut status = lock(&self.core.status);
            match *status {
                Lifecycle::Started => *status = Lifecycle::Stopped,
                Lifecycle::Created => {
                    return Err(HiveError::Other("runtime was never started".to_string()))
                }
                Lifecycle::Stopped => return Err(HiveError::RuntimeStopped),
            }
        }
        self.core.shutdown.cancel();
        let handle = lock(&self.core.run_handle).take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| HiveError::Other(format!("scheduler task failed: {e}")))?;
        }
        Ok(())
    }

    /// Waits until every accepted message, including the transitive
    /// cascade of republishes, has been delivered, then stops.
    pub async fn stop_when_idle(&self) -> Result<()> {
        loop {
            let notified = self.core.idle_notify.notified();
            tokio::pin!(notified);
            // Register before checking: a notify_waiters between the load
            // and the first poll would otherwise be lost.
            notified.as_mut().enable();
            if self.core.pending.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
        self.stop().await
    }

    /// Runs until ctrl-c, then stops.
    pub async fn stop_when_signal(&self) -> Result<()> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| HiveError::Other(format!("failed to listen for ctrl-c: {e}")))?;
        self.stop().await
    }

    /// Typed access to a live agent instance. Instantiates it if needed;
    /// `f` runs while the instance is checked out, so it must not block.
    pub async fn try_with_agent_instance<T, F, R>(&self, id: &AgentId, f: F) -> Result<R>
    where
        T: Agent + 'static,
        F: FnOnce(&mut T) -> R,
    {
        let mut agent = self.core.checkout(id).await?;
        let outcome = match agent.as_any_mut().downcast_mut::<T>() {
            Some(concrete) => Ok(f(concrete)),
            None => Err(HiveError::Other(format!(
                "agent {id} is not of the requested type"
            ))),
        };
        self.core.checkin(id.clone(), agent);
        outcome
    }

    pub fn agent_proxy(&self, agent_id: AgentId) -> AgentProxy {
        AgentProxy::new(agent_id, self.core.clone() as Arc<dyn AgentRuntime>)
    }
}

#[async_trait]
impl AgentRuntime for SingleThreadedAgentRuntime {
    async fn send_message(
        &self,
        message: AnyMessage,
        recipient: AgentId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<Option<AnyMessage>> {
        self.core
            .send_message(message, recipient, sender, cancellation_token)
            .await
    }

    async fn publish_message(
        &self,
        message: AnyMessage,
        topic_id: TopicId,
        sender: Option<AgentId>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        self.core
            .publish_message(message, topic_id, sender, cancellation_token)
            .await
    }

    async fn register_factory(
        &self,
        agent_type: AgentType,
        factory: AgentFactory,
    ) -> Result<AgentType> {
        self.core.register_factory(agent_type, factory).await
    }

    async fn register_agent_instance(
        &self,
        agent: Box<dyn Agent>,
        id: AgentId,
    ) -> Result<AgentId> {
        self.core.register_agent_instance(agent, id).await
    }

    async fn add_subscription(&self, subscription: Box<dyn Subscription>) -> Result<()> {
        self.core.add_subscription(subscription).await
    }

    async fn remove_subscription(&self, id: &str) -> Result<()> {
        self.core.remove_subscription(id).await
    }

    async fn agent_metadata(&self, agent_id: &AgentId) -> Result<AgentMetadata> {
        self.core.agent_metadata(agent_id).await
    }

    async fn agent_save_state(&self, agent_id: &AgentId) -> Result<AgentState> {
        self.core.agent_save_state(agent_id).await
    }

    async fn agent_load_state(&self, agent_id: &AgentId, state: &AgentState) -> Result<()> {
        self.core.agent_load_state(agent_id, state).await
    }

    async fn save_state(&self) -> Result<HashMap<String, AgentState>> {
        self.core.save_state().await
    }

    async fn load_state(&self, state: &HashMap<String, AgentState>) -> Result<()> {
        self.core.load_state(state).await
    }

    fn unprocessed_messages_count(&self) -> usize {
        self.core.unprocessed_messages_count()
    }
}
