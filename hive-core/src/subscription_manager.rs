//! Bookkeeping for installed subscriptions.
//!
//! Keeps subscriptions in installation order and caches, per topic already
//! seen, the resolved recipient list. Recipients are deduplicated by agent
//! id so a message reaches each agent at most once even when several
//! subscriptions map a topic to the same instance.

use crate::agent_id::AgentId;
use crate::error::{HiveError, Result};
use crate::subscription::Subscription;
use crate::topic::TopicId;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub(crate) struct SubscriptionManager {
    subscriptions: Vec<Box<dyn Subscription>>,
    seen_topics: HashSet<TopicId>,
    subscribed_recipients: HashMap<TopicId, Vec<AgentId>>,
}

impl SubscriptionManager {
    pub fn add_subscription(&mut self, subscription: Box<dyn Subscription>) -> Result<()> {
        if self.subscriptions.iter().any(|s| s.id() == subscription.id()) {
            return Err(HiveError::SubscriptionExists(subscription.id().to_string()));
        }
        // Fold the new subscription into every cached topic instead of
        // rebuilding the whole cache.
        for topic in &self.seen_topics {
            if subscription.is_match(topic) {
                let recipient = subscription.map_to_agent(topic)?;
                let recipients = self.subscribed_recipients.entry(topic.clone()).or_default();
                if !recipients.contains(&recipient) {
                    recipients.push(recipient);
                }
            }
        }
        self.subscriptions.push(subscription);
        Ok(())
    }

    pub fn remove_subscription(&mut self, id: &str) -> Result<()> {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id() != id);
        if self.subscriptions.len() == before {
            return Err(HiveError::SubscriptionNotFound(id.to_string()));
        }
        self.rebuild_subscription_cache()?;
        Ok(())
    }

    /// Resolved recipients for `topic`, in subscription installation order.
    pub fn subscribed_recipients(&mut self, topic: &TopicId) -> Result<&[AgentId]> {
        if !self.seen_topics.contains(topic) {
            self.build_for_new_topic(topic.clone())?;
        }
        Ok(self
            .subscribed_recipients
            .get(topic)
            .map(|v| v.as_slice())
            .unwrap_or(&[]))
    }

    fn build_for_new_topic(&mut self, topic: TopicId) -> Result<()> {
        let recipients = Self::resolve(&self.subscriptions, &topic)?;
        self.seen_topics.insert(topic.clone());
        self.subscribed_recipients.insert(topic, recipients);
        Ok(())
    }

    fn rebuild_subscription_cache(&mut self) -> Result<()> {
        self.subscribed_recipients.clear();
        for topic in self.seen_topics.clone() {
            let recipients = Self::resolve(&self.subscriptions, &topic)?;
            self.subscribed_recipients.insert(topic, recipients);
        }
        Ok(())
    }

    fn resolve(subscriptions: &[Box<dyn Subscription>], topic: &TopicId) -> Result<Vec<AgentId>> {
        let mut recipients = Vec::new();
        for subscription in subscriptions {
            if subscription.is_match(topic) {
                let recipient = subscription.map_to_agent(topic)?;
                if !recipients.contains(&recipient) {
                    recipients.push(recipient);
                }
            }
        }
        Ok(recipients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_id::AgentType;
    use crate::type_subscription::TypeSubscription;

    fn sub(topic_type: &str, agent_type: &str) -> Box<dyn Subscription> {
        Box::new(
            TypeSubscription::new(topic_type, AgentType::new(agent_type).unwrap()).unwrap(),
        )
    }

    #[test]
    fn test_recipients_in_installation_order() {
        let mut manager = SubscriptionManager::default();
        manager.add_subscription(sub("tick", "first")).unwrap();
        manager.add_subscription(sub("tick", "second")).unwrap();
        let topic = TopicId::new("tick", "s").unwrap();
        let recipients = manager.subscribed_recipients(&topic).unwrap();
        assert_eq!(
            recipients,
            &[
                AgentId::new("first", "s").unwrap(),
                AgentId::new("second", "s").unwrap()
            ]
        );
    }

    #[test]
    fn test_duplicate_recipients_collapsed() {
        let mut manager = SubscriptionManager::default();
        // Two distinct subscriptions resolving to the same agent id.
        manager.add_subscription(sub("tick", "worker")).unwrap();
        manager.add_subscription(sub("tick", "worker")).unwrap();
        let topic = TopicId::new("tick", "s").unwrap();
        assert_eq!(manager.subscribed_recipients(&topic).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut manager = SubscriptionManager::default();
        let subscription =
            TypeSubscription::new("tick", AgentType::new("worker").unwrap()).unwrap();
        manager
            .add_subscription(Box::new(subscription.clone()))
            .unwrap();
        let err = manager.add_subscription(Box::new(subscription)).unwrap_err();
        assert!(matches!(err, HiveError::SubscriptionExists(_)));
    }

    #[test]
    fn test_add_after_topic_seen_updates_cache() {
        let mut manager = SubscriptionManager::default();
        let topic = TopicId::new("tick", "s").unwrap();
        assert!(manager.subscribed_recipients(&topic).unwrap().is_empty());
        manager.add_subscription(sub("tick", "worker")).unwrap();
        assert_eq!(manager.subscribed_recipients(&topic).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_rebuilds_cache() {
        let mut manager = SubscriptionManager::default();
        let subscription =
            TypeSubscription::new("tick", AgentType::new("worker").unwrap()).unwrap();
        let id = subscription.id().to_string();
        manager.add_subscription(Box::new(subscription)).unwrap();
        let topic = TopicId::new("tick", "s").unwrap();
        assert_eq!(manager.subscribed_recipients(&topic).unwrap().len(), 1);
        manager.remove_subscription(&id).unwrap();
        assert!(manager.subscribed_recipients(&topic).unwrap().is_empty());
        assert!(matches!(
            manager.remove_subscription(&id),
            Err(HiveError::SubscriptionNotFound(_))
        ));
    }
}
