//! Shared fixtures for the integration suites: message types and a few
//! small agents with observable behavior.

#![allow(dead_code)]

use futures::future::BoxFuture;
use hive_core::*;
use std::any::Any;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq)]
pub struct Text(pub String);

#[derive(Clone, Debug, PartialEq)]
pub struct EchoRequest(pub String);

#[derive(Clone, Debug, PartialEq)]
pub struct EchoReply(pub String);

#[derive(Clone, Debug, PartialEq)]
pub struct FailRequest;

#[derive(Clone, Debug, PartialEq)]
pub struct SleepRequest;

#[derive(Clone, Debug, PartialEq)]
pub struct Hop(pub u32);

/// Installs a test-writer subscriber so runtime warnings show up in
/// captured test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn log_entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Event-only agent that records every `Text` it sees.
pub struct Recorder {
    pub log: Log,
}

fn record_text<'a>(
    state: &'a mut Recorder,
    message: Text,
    _ctx: &'a AgentContext<'a>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        state.log.lock().unwrap().push(message.0);
        Ok(())
    })
}

impl TypeRouted for Recorder {
    fn routes() -> Result<HandlerRegistry<Self>> {
        let mut routes = HandlerRegistry::new();
        routes.on_event::<Text, _>(record_text)?;
        Ok(routes)
    }
}

/// RPC agent: echoes with a prefix, fails on demand, sleeps on demand.
/// Carries persistent state (prefix and call count).
pub struct EchoState {
    pub prefix: String,
    pub calls: u64,
}

impl EchoState {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            calls: 0,
        }
    }
}

fn handle_echo<'a>(
    state: &'a mut EchoState,
    message: EchoRequest,
    _ctx: &'a AgentContext<'a>,
) -> BoxFuture<'a, Result<EchoReply>> {
    Box::pin(async move {
        state.calls += 1;
        Ok(EchoReply(format!("{}{}", state.prefix, message.0)))
    })
}

fn handle_fail<'a>(
    _state: &'a mut EchoState,
    _message: FailRequest,
    _ctx: &'a AgentContext<'a>,
) -> BoxFuture<'a, Result<EchoReply>> {
    Box::pin(async move { Err(HiveError::Other("handler exploded".to_string())) })
}

fn handle_sleep<'a>(
    _state: &'a mut EchoState,
    _message: SleepRequest,
    _ctx: &'a AgentContext<'a>,
) -> BoxFuture<'a, Result<EchoReply>> {
    Box::pin(async move {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        Ok(EchoReply("woke up".to_string()))
    })
}

impl TypeRouted for EchoState {
    fn routes() -> Result<HandlerRegistry<Self>> {
        let mut routes = HandlerRegistry::new();
        routes.on_rpc::<EchoRequest, EchoReply, _>(handle_echo)?;
        routes.on_rpc::<FailRequest, EchoReply, _>(handle_fail)?;
        routes.on_rpc::<SleepRequest, EchoReply, _>(handle_sleep)?;
        Ok(routes)
    }

    fn save_state(&self) -> Result<AgentState> {
        let mut state = AgentState::new();
        state.insert("prefix".to_string(), serde_json::json!(self.prefix));
        state.insert("calls".to_string(), serde_json::json!(self.calls));
        Ok(state)
    }

    fn load_state(&mut self, state: &AgentState) -> Result<()> {
        if let Some(value) = state.get("prefix") {
            self.prefix = serde_json::from_value(value.clone())?;
        }
        if let Some(value) = state.get("calls") {
            self.calls = serde_json::from_value(value.clone())?;
        }
        Ok(())
    }
}

/// Event agent that calls the echo agent over RPC and records the reply.
pub struct Driver {
    pub log: Log,
}

fn drive<'a>(
    state: &'a mut Driver,
    message: Text,
    ctx: &'a AgentContext<'a>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let reply = ctx
            .send_message(
                AnyMessage::new(EchoRequest(message.0)),
                AgentId::new("echo", "default")?,
            )
            .await?
            .and_then(|m| m.downcast::<EchoReply>())
            .ok_or_else(|| HiveError::Other("echo returned no reply".to_string()))?;
        state.log.lock().unwrap().push(reply.0);
        Ok(())
    })
}

impl TypeRouted for Driver {
    fn routes() -> Result<HandlerRegistry<Self>> {
        let mut routes = HandlerRegistry::new();
        routes.on_event::<Text, _>(drive)?;
        Ok(routes)
    }
}

/// Republishing agent: a `Hop(n)` at source `step-n` records itself and
/// publishes `Hop(n-1)` to source `step-(n-1)` until the chain bottoms out.
pub struct Relay {
    pub log: Log,
}

fn relay_hop<'a>(
    state: &'a mut Relay,
    message: Hop,
    ctx: &'a AgentContext<'a>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        state.log.lock().unwrap().push(format!("hop-{}", message.0));
        if message.0 > 0 {
            let next = message.0 - 1;
            ctx.publish_message(
                AnyMessage::new(Hop(next)),
                TopicId::new("hop", format!("step-{next}"))?,
            )
            .await?;
        }
        Ok(())
    })
}

impl TypeRouted for Relay {
    fn routes() -> Result<HandlerRegistry<Self>> {
        let mut routes = HandlerRegistry::new();
        routes.on_event::<Hop, _>(relay_hop)?;
        Ok(routes)
    }
}

/// Hand-rolled [`Agent`] for instance registration; records `Text`s.
pub struct ManualAgent {
    id: AgentId,
    pub log: Log,
}

impl ManualAgent {
    pub fn new(id: AgentId, log: Log) -> Self {
        Self { id, log }
    }
}

#[async_trait::async_trait]
impl Agent for ManualAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn metadata(&self) -> AgentMetadata {
        AgentMetadata {
            r#type: self.id.r#type().to_string(),
            key: self.id.key().to_string(),
            description: "a hand-rolled agent".to_string(),
        }
    }

    async fn on_message(
        &mut self,
        message: AnyMessage,
        _ctx: &MessageContext,
    ) -> Result<Option<AnyMessage>> {
        match message.downcast::<Text>() {
            Some(text) => {
                self.log.lock().unwrap().push(text.0);
                Ok(None)
            }
            None => Err(HiveError::UnhandledMessage {
                recipient: self.id.clone(),
                message_type: message.type_name().to_string(),
            }),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registers a recorder subscribed to `topic_type` and returns its log.
pub async fn register_recorder(
    runtime: &SingleThreadedAgentRuntime,
    agent_type: &str,
    topic_type: &str,
) -> Result<Log> {
    let log = new_log();
    let captured = log.clone();
    let agent_type = register_routed::<Recorder, _>(runtime, agent_type, "records text", move || {
        Recorder {
            log: captured.clone(),
        }
    })
    .await?;
    runtime
        .add_subscription(Box::new(TypeSubscription::new(topic_type, agent_type)?))
        .await?;
    Ok(log)
}
