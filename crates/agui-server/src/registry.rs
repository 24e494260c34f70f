use crate::endpoint::AgentEndpoint;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry of the `GET /agents` listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
}

/// Agent endpoints by URL name.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    endpoints: BTreeMap<String, Arc<AgentEndpoint>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `endpoint` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, endpoint: AgentEndpoint) {
        self.endpoints.insert(name.into(), Arc::new(endpoint));
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, endpoint: AgentEndpoint) -> Self {
        self.register(name, endpoint);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<AgentEndpoint>> {
        self.endpoints.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentEndpoint)> {
        self.endpoints
            .iter()
            .map(|(name, endpoint)| (name.as_str(), endpoint.as_ref()))
    }

    pub fn summaries(&self) -> Vec<AgentSummary> {
        self.iter()
            .map(|(name, endpoint)| AgentSummary {
                name: name.to_string(),
                description: endpoint.config().description.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
