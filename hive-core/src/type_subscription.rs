use crate::agent_id::{AgentId, AgentType};
use crate::error::{HiveError, Result};
use crate::rpc::is_rpc_topic;
use crate::subscription::Subscription;
use crate::topic::{is_valid_topic_type, TopicId};
use uuid::Uuid;

/// Subscribes one agent type to one topic type.
///
/// A matching topic `T@source` maps to the agent `agent_type/source`, so
/// each distinct source gets its own agent instance.
#[derive(Debug, Clone)]
pub struct TypeSubscription {
    id: String,
    topic_type: String,
    agent_type: AgentType,
}

impl TypeSubscription {
    pub fn new(topic_type: impl Into<String>, agent_type: AgentType) -> Result<Self> {
        let topic_type = topic_type.into();
        if !is_valid_topic_type(&topic_type) {
            return Err(HiveError::InvalidTopicType(topic_type));
        }
        if is_rpc_topic(&topic_type) {
            return Err(HiveError::ReservedTopicType(topic_type));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            topic_type,
            agent_type,
        })
    }

    pub fn topic_type(&self) -> &str {
        &self.topic_type
    }

    pub fn agent_type(&self) -> &AgentType {
        &self.agent_type
    }
}

impl Subscription for TypeSubscription {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_match(&self, topic: &TopicId) -> bool {
        topic.r#type == self.topic_type
    }

    fn map_to_agent(&self, topic: &TopicId) -> Result<AgentId> {
        if !self.is_match(topic) {
            return Err(HiveError::CantHandle {
                subscription_id: self.id.clone(),
                topic: topic.clone(),
            });
        }
        AgentId::new(self.agent_type.as_str(), topic.source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub() -> TypeSubscription {
        TypeSubscription::new("tick", AgentType::new("clock").unwrap()).unwrap()
    }

    #[test]
    fn test_match_on_topic_type_only() {
        let sub = sub();
        assert!(sub.is_match(&TopicId::new("tick", "a").unwrap()));
        assert!(sub.is_match(&TopicId::new("tick", "b").unwrap()));
        assert!(!sub.is_match(&TopicId::new("tock", "a").unwrap()));
    }

    #[test]
    fn test_map_uses_topic_source_as_key() {
        let sub = sub();
        let id = sub.map_to_agent(&TopicId::new("tick", "room-7").unwrap()).unwrap();
        assert_eq!(id, AgentId::new("clock", "room-7").unwrap());
    }

    #[test]
    fn test_map_unmatched_topic_fails() {
        let sub = sub();
        let err = sub
            .map_to_agent(&TopicId::new("tock", "room-7").unwrap())
            .unwrap_err();
        assert!(matches!(err, HiveError::CantHandle { .. }));
    }

    #[test]
    fn test_each_instance_gets_fresh_id() {
        assert_ne!(sub().id(), sub().id());
    }

    #[test]
    fn test_reserved_topic_namespace_rejected() {
        let err = TypeSubscription::new("rpc:request:a:b", AgentType::new("clock").unwrap())
            .unwrap_err();
        assert!(matches!(err, HiveError::ReservedTopicType(_)));
    }
}
