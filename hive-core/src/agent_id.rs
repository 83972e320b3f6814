//! Agent identity.
//!
//! An [`AgentId`] names one logical agent instance: a registered type plus
//! an instance key. Two ids are the same agent exactly when both fields are
//! equal; the runtime uses the id as the map key for lazy instantiation.

use crate::error::{HiveError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn agent_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The charset deliberately excludes '/' (the id separator) and ':'
    // (reserved for rpc correlation topics).
    RE.get_or_init(|| Regex::new(r"^[\w\-\.]+$").unwrap_or_else(|e| panic!("{e}")))
}

/// Returns true when `value` is usable as an agent type.
pub fn is_valid_agent_type(value: &str) -> bool {
    agent_type_regex().is_match(value)
}

/// A validated agent type name.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentType(String);

impl AgentType {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if !is_valid_agent_type(&value) {
            return Err(HiveError::InvalidAgentType(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies an agent instance within a runtime: `type/key`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId {
    pub r#type: String,
    pub key: String,
}

impl AgentId {
    pub fn new(agent_type: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let agent_type = agent_type.into();
        if !is_valid_agent_type(&agent_type) {
            return Err(HiveError::InvalidAgentType(agent_type));
        }
        let key = key.into();
        if key.is_empty() {
            // An empty key would not survive the `type/key` round trip.
            return Err(HiveError::InvalidAgentId(format!("{agent_type}/")));
        }
        Ok(Self {
            r#type: agent_type,
            key,
        })
    }

    pub fn r#type(&self) -> &str {
        &self.r#type
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl FromStr for AgentId {
    type Err = HiveError;

    fn from_str(s: &str) -> Result<Self> {
        let (agent_type, key) = s
            .split_once('/')
            .ok_or_else(|| HiveError::InvalidAgentId(s.to_string()))?;
        if key.is_empty() {
            return Err(HiveError::InvalidAgentId(s.to_string()));
        }
        AgentId::new(agent_type, key)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.r#type, self.key)
    }
}
