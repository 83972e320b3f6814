//! Saving and restoring agent state, within one runtime and across two.

mod common;

use common::*;
use hive_core::*;

async fn register_echo(runtime: &SingleThreadedAgentRuntime) {
    register_routed::<EchoState, _>(runtime, "echo", "echoes with a prefix", || {
        EchoState::new("echo:")
    })
    .await
    .unwrap();
}

async fn call_echo(runtime: &SingleThreadedAgentRuntime, text: &str) -> EchoReply {
    runtime
        .send_message(
            AnyMessage::new(EchoRequest(text.to_string())),
            AgentId::new("echo", "default").unwrap(),
            None,
            None,
        )
        .await
        .unwrap()
        .and_then(|m| m.downcast::<EchoReply>())
        .unwrap()
}

#[tokio::test]
async fn test_agent_state_round_trip() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;

    call_echo(&runtime, "one").await;
    call_echo(&runtime, "two").await;

    let id = AgentId::new("echo", "default").unwrap();
    let saved = runtime.agent_save_state(&id).await.unwrap();
    assert_eq!(saved.get("calls"), Some(&serde_json::json!(2)));

    call_echo(&runtime, "three").await;
    runtime.agent_load_state(&id, &saved).await.unwrap();
    let calls = runtime
        .try_with_agent_instance::<RoutedAgent<EchoState>, _, _>(&id, |agent| agent.state().calls)
        .await
        .unwrap();
    assert_eq!(calls, 2);
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_runtime_state_moves_across_runtimes() {
    let first = SingleThreadedAgentRuntime::new();
    first.start().unwrap();
    register_echo(&first).await;
    call_echo(&first, "one").await;
    let snapshot = first.save_state().await.unwrap();
    first.stop().await.unwrap();
    assert!(snapshot.contains_key("echo/default"));

    let second = SingleThreadedAgentRuntime::new();
    second.start().unwrap();
    register_echo(&second).await;
    second.load_state(&snapshot).await.unwrap();

    let id = AgentId::new("echo", "default").unwrap();
    let calls = second
        .try_with_agent_instance::<RoutedAgent<EchoState>, _, _>(&id, |agent| agent.state().calls)
        .await
        .unwrap();
    assert_eq!(calls, 1);
    // The restored agent keeps serving.
    assert_eq!(call_echo(&second, "more").await.0, "echo:more");
    second.stop().await.unwrap();
}

#[tokio::test]
async fn test_load_state_requires_a_factory() {
    let first = SingleThreadedAgentRuntime::new();
    first.start().unwrap();
    register_echo(&first).await;
    call_echo(&first, "one").await;
    let snapshot = first.save_state().await.unwrap();
    first.stop().await.unwrap();

    let second = SingleThreadedAgentRuntime::new();
    let err = second.load_state(&snapshot).await.unwrap_err();
    assert!(matches!(err, HiveError::StateFactoryMissing(_)));
}

#[tokio::test]
async fn test_typed_instance_access_checks_the_type() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;
    let id = AgentId::new("echo", "default").unwrap();

    let err = runtime
        .try_with_agent_instance::<RoutedAgent<Recorder>, _, _>(&id, |_| ())
        .await
        .unwrap_err();
    assert!(matches!(err, HiveError::Other(_)));
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_proxy_exposes_metadata_and_rpc() {
    let runtime = SingleThreadedAgentRuntime::new();
    runtime.start().unwrap();
    register_echo(&runtime).await;

    let proxy = runtime.agent_proxy(AgentId::new("echo", "default").unwrap());
    let metadata = proxy.metadata().await.unwrap();
    assert_eq!(metadata.r#type, "echo");
    assert_eq!(metadata.key, "default");
    assert_eq!(metadata.description, "echoes with a prefix");

    let reply = proxy
        .send_message(AnyMessage::new(EchoRequest("via proxy".to_string())), None)
        .await
        .unwrap()
        .and_then(|m| m.downcast::<EchoReply>())
        .unwrap();
    assert_eq!(reply.0, "echo:via proxy");
    runtime.stop().await.unwrap();
}
