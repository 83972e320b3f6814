//! Topic identity for broadcast delivery.
//!
//! A [`TopicId`] scopes a published message: the type says what kind of
//! event it is, the source says where it happened. The charset follows the
//! CloudEvents `type` attribute, so ':' and '=' are legal in topic types
//! even though they are not legal in agent types.

use crate::error::{HiveError, Result};
use crate::message_handler_context::MessageHandlerContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn topic_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w\-\.\:=]+$").unwrap_or_else(|e| panic!("{e}")))
}

/// Returns true when `value` is usable as a topic type.
pub fn is_valid_topic_type(value: &str) -> bool {
    topic_type_regex().is_match(value)
}

/// The scope of a broadcast message: `type@source`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicId {
    #[serde(rename = "type")]
    pub r#type: String,
    pub source: String,
}

impl TopicId {
    pub fn new(topic_type: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let topic_type = topic_type.into();
        if !is_valid_topic_type(&topic_type) {
            return Err(HiveError::InvalidTopicType(topic_type));
        }
        let source = source.into();
        if source.is_empty() {
            return Err(HiveError::InvalidTopicType(format!(
                "{topic_type}@<empty source>"
            )));
        }
        Ok(Self {
            r#type: topic_type,
            source,
        })
    }

    pub fn r#type(&self) -> &str {
        &self.r#type
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.r#type, self.source)
    }
}

/// Builds a [`TopicId`] on the `"default"` topic type with a convenient
/// source: an explicit one if given, else the key of the agent currently
/// handling a message, else `"default"`.
#[derive(Debug, Clone)]
pub struct DefaultTopicId;

impl DefaultTopicId {
    pub fn new(topic_type: Option<&str>, source: Option<&str>) -> Result<TopicId> {
        let topic_type = topic_type.unwrap_or("default");
        let source = match source {
            Some(source) => source.to_string(),
            None => MessageHandlerContext::agent_id()
                .map(|id| id.key)
                .unwrap_or_else(|| "default".to_string()),
        };
        TopicId::new(topic_type, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_type_charset() {
        assert!(TopicId::new("user.message", "s").is_ok());
        assert!(TopicId::new("rpc:request:a:b", "s").is_ok());
        assert!(TopicId::new("k=v", "s").is_ok());
        assert!(TopicId::new("user message", "s").is_err());
        assert!(TopicId::new("user@message", "s").is_err());
        assert!(TopicId::new("", "s").is_err());
    }

    #[test]
    fn test_empty_source_rejected() {
        assert!(TopicId::new("user.message", "").is_err());
    }

    #[test]
    fn test_display() {
        let topic = TopicId::new("user.message", "session-1").unwrap();
        assert_eq!(topic.to_string(), "user.message@session-1");
    }

    #[test]
    fn test_default_topic_outside_handler() {
        let topic = DefaultTopicId::new(None, None).unwrap();
        assert_eq!(topic.r#type(), "default");
        assert_eq!(topic.source(), "default");

        let topic = DefaultTopicId::new(Some("tick"), Some("clock-1")).unwrap();
        assert_eq!(topic.r#type(), "tick");
        assert_eq!(topic.source(), "clock-1");
    }

    #[test]
    fn test_serde_type_field_rename() {
        let topic = TopicId::new("tick", "clock").unwrap();
        let json = serde_json::to_string(&topic).unwrap();
        assert!(json.contains("\"type\":\"tick\""));
        let back: TopicId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, topic);
    }
}
