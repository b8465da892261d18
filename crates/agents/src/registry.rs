use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use wring_core::config::GithubConfig;
use wring_core::Base;

use crate::agent::{Agent, AgentError};
use crate::github;

/// Builds an agent from the store handle and the pipe JSON.
pub type AgentFactory =
    Box<dyn Fn(Arc<dyn Base>, &Value) -> Result<Box<dyn Agent>, AgentError> + Send + Sync>;

/// Maps pipe `kind` names to agent constructors.
/// Only kinds registered here can ever be built from user JSON.
pub struct AgentRegistry {
    factories: BTreeMap<String, AgentFactory>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Every agent shipped with wring.
    pub fn standard(github: GithubConfig) -> Self {
        let github = Arc::new(github);
        let mut factories: BTreeMap<String, AgentFactory> = BTreeMap::new();
        factories.insert(
            "github".to_string(),
            Box::new(move |base, json| {
                github::agent::from_json(&github, base, json)
                    .map(|agent| Box::new(agent) as Box<dyn Agent>)
            }),
        );
        Self { factories }
    }

    /// Register a constructor. Returns error if the kind is already taken.
    pub fn register<F>(&mut self, kind: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(Arc<dyn Base>, &Value) -> Result<Box<dyn Agent>, AgentError> + Send + Sync + 'static,
    {
        if self.factories.contains_key(kind) {
            return Err(RegistryError::DuplicateKind(kind.to_string()));
        }
        self.factories.insert(kind.to_string(), Box::new(factory));
        Ok(())
    }

    /// Build the agent named by `json.kind` (or the older `json.class`).
    pub fn build(&self, base: Arc<dyn Base>, json: &Value) -> Result<Box<dyn Agent>, AgentError> {
        let kind = kind_of(json)?;
        match self.factories.get(kind) {
            Some(factory) => factory(base, json),
            None => Err(AgentError::Config(format!(
                "Your JSON object must contain a known \"kind\", but \"{kind}\" is not one of: {}",
                self.kinds().join(", ")
            ))),
        }
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_of(json: &Value) -> Result<&str, AgentError> {
    let kind = json
        .get("kind")
        .filter(|v| !v.is_null())
        .or_else(|| json.get("class"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if kind.is_empty() {
        return Err(AgentError::Config(
            "Your JSON object must contain non-empty \"kind\" attribute".to_string(),
        ));
    }
    Ok(kind)
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Agent kind '{0}' is already registered")]
    DuplicateKind(String),
}
