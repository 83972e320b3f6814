//! Point-to-point calls: round trips, failure tagging, cancellation, and
//! nested calls issued from inside handlers.

mod common;

use common::*;
use hive_core::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn register_echo(runtime: &SingleThreadedAgentRuntime) -> AgentType {
    register_routed::<EchoState, _>(runtime, "echo", "echoes with a prefix", || {
        EchoState::new("echo:")
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_rpc_round_trip() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;

    let reply = runtime
        .send_message(
            AnyMessage::new(EchoRequest("hello".to_string())),
            AgentId::new("echo", "default").unwrap(),
            None,
            None,
        )
        .await
        .unwrap()
        .and_then(|m| m.downcast::<EchoReply>())
        .unwrap();
    assert_eq!(reply, EchoReply("echo:hello".to_string()));
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_handler_error_comes_back_tagged() {
    init_tracing();
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;

    let err = runtime
        .send_message(
            AnyMessage::new(FailRequest),
            AgentId::new("echo", "default").unwrap(),
            None,
            None,
        )
        .await
        .unwrap_err();
    match err {
        HiveError::RpcFailed { recipient, reason } => {
            assert_eq!(recipient, AgentId::new("echo", "default").unwrap());
            assert!(reason.contains("handler exploded"));
        }
        other => panic!("expected RpcFailed, got {other:?}"),
    }
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_direct_send_without_route_is_unhandled() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;

    let err = runtime
        .send_message(
            AnyMessage::new(Text("not routed".to_string())),
            AgentId::new("echo", "default").unwrap(),
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HiveError::UnhandledMessage { .. }));
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_resolves_the_caller() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = runtime
        .send_message(
            AnyMessage::new(SleepRequest),
            AgentId::new("echo", "default").unwrap(),
            None,
            Some(token),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HiveError::Cancelled));
    runtime.stop_when_idle().await.unwrap();
}

#[tokio::test]
async fn test_nested_rpc_from_inside_a_handler() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;

    let log = new_log();
    let captured = log.clone();
    let agent_type = register_routed::<Driver, _>(&runtime, "driver", "calls echo", move || {
        Driver {
            log: captured.clone(),
        }
    })
    .await
    .unwrap();
    runtime
        .add_subscription(Box::new(TypeSubscription::new("drive", agent_type).unwrap()))
        .await
        .unwrap();

    runtime
        .publish_message(
            AnyMessage::new(Text("nested".to_string())),
            TopicId::new("drive", "s").unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
    runtime.stop_when_idle().await.unwrap();

    assert_eq!(log_entries(&log), vec!["echo:nested"]);
}

#[tokio::test]
async fn test_replay_double_exhausts() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();

    let canned: Arc<Mutex<VecDeque<&str>>> =
        Arc::new(Mutex::new(VecDeque::from(vec!["first", "second"])));
    let responses = canned.clone();
    ClosureAgent::<EchoRequest>::register(&runtime, "replay", move |_ctx, _message, _mctx| {
        let responses = responses.clone();
        async move {
            match responses.lock().unwrap().pop_front() {
                Some(reply) => Ok(Some(AnyMessage::new(EchoReply(reply.to_string())))),
                None => Err(HiveError::Other("replay exhausted".to_string())),
            }
        }
    })
    .await
    .unwrap();

    let recipient = AgentId::new("replay", "default").unwrap();
    for expected in ["first", "second"] {
        let reply = runtime
            .send_message(AnyMessage::new(EchoRequest("q".to_string())), recipient.clone(), None, None)
            .await
            .unwrap()
            .and_then(|m| m.downcast::<EchoReply>())
            .unwrap();
        assert_eq!(reply.0, expected);
    }

    let err = runtime
        .send_message(AnyMessage::new(EchoRequest("q".to_string())), recipient, None, None)
        .await
        .unwrap_err();
    match err {
        HiveError::RpcFailed { reason, .. } => assert!(reason.contains("replay exhausted")),
        other => panic!("expected RpcFailed, got {other:?}"),
    }
    runtime.stop().await.unwrap();
}
