use crate::service::AppState;
use agui_runtime::{
    Agent, ConfigError, EventTranslator, ExecutionConfig, ExecutionOverrides, RequestContext,
    RunCoordinator, Settings, SystemMessageProvider,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-endpoint options layered over the global [`Settings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub description: String,
    /// Require an authenticated caller even when the global setting does not.
    pub auth_required: bool,
    /// Replaces the global allow-list when set.
    pub allowed_origins: Option<Vec<String>>,
    #[serde(flatten)]
    pub overrides: ExecutionOverrides,
}

impl EndpointConfig {
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_auth_required(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: ExecutionOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// An agent plus the hooks and options used to serve it.
pub struct AgentEndpoint {
    agent: Arc<dyn Agent>,
    translator: Option<Arc<dyn EventTranslator>>,
    system_message: Option<Arc<dyn SystemMessageProvider>>,
    config: EndpointConfig,
}

impl AgentEndpoint {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            translator: None,
            system_message: None,
            config: EndpointConfig::default(),
        }
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn EventTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    #[must_use]
    pub fn with_system_message(mut self, provider: Arc<dyn SystemMessageProvider>) -> Self {
        self.system_message = Some(provider);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn execution_config(&self, settings: &Settings) -> Result<ExecutionConfig, ConfigError> {
        ExecutionConfig::resolve(settings, &self.config.overrides)
    }

    /// Fresh coordinator for one request.
    pub fn coordinator(
        &self,
        state: &AppState,
        request: RequestContext,
    ) -> Result<RunCoordinator, ConfigError> {
        let config = self.execution_config(&state.settings)?;
        Ok(RunCoordinator::new(self.agent.clone(), config, request)
            .with_translator(self.translator.clone())
            .with_system_message(self.system_message.clone())
            .with_state_store(state.state_store.clone())
            .with_encoder(state.encoder.clone()))
    }
}
