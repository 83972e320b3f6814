use crate::agent_id::{AgentId, AgentType};
use crate::error::{HiveError, Result};
use crate::subscription::Subscription;
use crate::subscription_context::SubscriptionInstantiationContext;
use crate::topic::TopicId;
use crate::type_subscription::TypeSubscription;

/// A [`TypeSubscription`] on the `"default"` topic type.
///
/// When no agent type is given it is taken from the surrounding
/// registration scope, which is how `register` wires an agent to the
/// default topic without naming itself twice.
#[derive(Debug, Clone)]
pub struct DefaultSubscription {
    inner: TypeSubscription,
}

impl DefaultSubscription {
    pub fn new(topic_type: Option<&str>, agent_type: Option<AgentType>) -> Result<Self> {
        let agent_type = match agent_type {
            Some(agent_type) => agent_type,
            None => SubscriptionInstantiationContext::agent_type().ok_or_else(|| {
                HiveError::Other(
                    "DefaultSubscription requires an agent type when used outside a \
                     registration scope"
                        .to_string(),
                )
            })?,
        };
        Ok(Self {
            inner: TypeSubscription::new(topic_type.unwrap_or("default"), agent_type)?,
        })
    }
}

impl Subscription for DefaultSubscription {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn is_match(&self, topic: &TopicId) -> bool {
        self.inner.is_match(topic)
    }

    fn map_to_agent(&self, topic: &TopicId) -> Result<AgentId> {
        self.inner.map_to_agent(topic)
    }
}
