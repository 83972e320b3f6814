//! Request/response correlation topics.
//!
//! When point-to-point calls ride on a pub/sub substrate, each call gets a
//! pair of topics inside the reserved `rpc:` namespace. ':' is a legal
//! topic-type character but not a legal agent-type character, so the
//! segments below parse unambiguously. The runtime rejects user publishes
//! and subscriptions whose topic type starts with the reserved prefix.

use crate::agent_id::is_valid_agent_type;
use uuid::Uuid;

/// Namespace prefix reserved for correlation topics.
pub const RPC_TOPIC_PREFIX: &str = "rpc:";

const REQUEST_PREFIX: &str = "rpc:request:";
const RESPONSE_PREFIX: &str = "rpc:response:";

/// A decoded `rpc:request:{recipient}:{sender}` topic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcRequestTopic {
    pub recipient_type: String,
    pub sender_type: String,
}

/// A decoded `rpc:response:{sender}:{request_id}` topic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponseTopic {
    pub sender_type: String,
    pub request_id: String,
}

/// Fresh correlation id for one call.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn format_rpc_request_topic(recipient_type: &str, sender_type: &str) -> String {
    format!("{REQUEST_PREFIX}{recipient_type}:{sender_type}")
}

pub fn format_rpc_response_topic(sender_type: &str, request_id: &str) -> String {
    format!("{RESPONSE_PREFIX}{sender_type}:{request_id}")
}

/// Whether `topic_type` lies anywhere in the reserved namespace.
pub fn is_rpc_topic(topic_type: &str) -> bool {
    topic_type.starts_with(RPC_TOPIC_PREFIX)
}

pub fn is_rpc_request(topic_type: &str) -> bool {
    parse_rpc_request_topic(topic_type).is_some()
}

pub fn is_rpc_response(topic_type: &str) -> bool {
    parse_rpc_response_topic(topic_type).is_some()
}

pub fn parse_rpc_request_topic(topic_type: &str) -> Option<RpcRequestTopic> {
    let rest = topic_type.strip_prefix(REQUEST_PREFIX)?;
    let (recipient_type, sender_type) = rest.split_once(':')?;
    if !is_valid_agent_type(recipient_type) || !is_valid_agent_type(sender_type) {
        return None;
    }
    Some(RpcRequestTopic {
        recipient_type: recipient_type.to_string(),
        sender_type: sender_type.to_string(),
    })
}

pub fn parse_rpc_response_topic(topic_type: &str) -> Option<RpcResponseTopic> {
    let rest = topic_type.strip_prefix(RESPONSE_PREFIX)?;
    let (sender_type, request_id) = rest.split_once(':')?;
    if !is_valid_agent_type(sender_type) || request_id.is_empty() || request_id.contains(':') {
        return None;
    }
    Some(RpcResponseTopic {
        sender_type: sender_type.to_string(),
        request_id: request_id.to_string(),
    })
}
