//! Startup validation of settings and endpoint configuration.

use crate::backends::Backends;
use crate::registry::AgentRegistry;
use agui_runtime::{
    resolve_error_policy, resolve_state_save_policy, BackendRegistry, Settings,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
    pub id: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl CheckMessage {
    fn warning(id: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    fn error(id: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.message)
    }
}

/// Validate everything a request would otherwise fail on at runtime.
///
/// Unknown settings keys are warnings; bad backend keys, policies and
/// allow-list entries are errors.
pub fn run_checks(
    settings: &Settings,
    backends: &Backends,
    agents: &AgentRegistry,
) -> Vec<CheckMessage> {
    let mut messages: Vec<CheckMessage> = settings
        .unknown_keys()
        .map(|key| CheckMessage::warning("agui.W001", format!("Unknown AG-UI setting: {key:?}")))
        .collect();

    check_backend(
        &mut messages,
        "AUTH_BACKEND",
        settings.auth_backend.as_deref(),
        &backends.auth,
    );
    check_backend(
        &mut messages,
        "STATE_BACKEND",
        settings.state_backend.as_deref(),
        &backends.state,
    );
    check_backend(
        &mut messages,
        "EVENT_ENCODER",
        Some(settings.event_encoder.as_str()),
        &backends.encoder,
    );

    if let Err(err) = resolve_error_policy(None, settings) {
        messages.push(CheckMessage::error("agui.E002", err.to_string()));
    }
    if let Err(err) = resolve_state_save_policy(None, settings) {
        messages.push(CheckMessage::error("agui.E004", err.to_string()));
    }
    if let Err(err) = settings.resolve_allowed_origins(None) {
        messages.push(CheckMessage::error("agui.E003", err.to_string()));
    }

    for (name, endpoint) in agents.iter() {
        if let Err(err) = endpoint.execution_config(settings) {
            messages.push(CheckMessage::error(
                "agui.E005",
                format!("agent {name:?}: {err}"),
            ));
        }
        let origins = endpoint.config().allowed_origins.as_deref();
        if let Err(err) = origins.map_or(Ok(None), |o| settings.resolve_allowed_origins(Some(o))) {
            messages.push(CheckMessage::error(
                "agui.E003",
                format!("agent {name:?}: {err}"),
            ));
        }
        if endpoint.config().auth_required && settings.auth_backend.is_none() {
            messages.push(CheckMessage::warning(
                "agui.W002",
                format!("agent {name:?} requires authentication but AUTH_BACKEND is not set"),
            ));
        }
    }
    if settings.require_authentication && settings.auth_backend.is_none() {
        messages.push(CheckMessage::warning(
            "agui.W002",
            "REQUIRE_AUTHENTICATION is set but AUTH_BACKEND is not",
        ));
    }

    messages
}

fn check_backend<T: ?Sized>(
    messages: &mut Vec<CheckMessage>,
    setting: &str,
    key: Option<&str>,
    registry: &BackendRegistry<T>,
) {
    let Some(key) = key else {
        return;
    };
    if !registry.contains(key) {
        let available: Vec<&str> = registry.keys().collect();
        messages.push(CheckMessage::error(
            "agui.E001",
            format!(
                "Invalid backend setting {setting}: unknown {} backend {key:?} (available: {})",
                registry.kind(),
                available.join(", ")
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{AgentEndpoint, EndpointConfig};
    use agui_protocol::RunAgentInput;
    use agui_runtime::{events_from_iter, Agent, EventStream, ExecutionOverrides, RequestContext};
    use std::sync::Arc;

    fn ids(messages: &[CheckMessage]) -> Vec<&'static str> {
        messages.iter().map(|m| m.id).collect()
    }

    fn idle_agent() -> Arc<dyn Agent> {
        Arc::new(
            |_input: RunAgentInput, _ctx: &RequestContext| -> EventStream { events_from_iter([]) },
        )
    }

    #[test]
    fn default_settings_pass() {
        let messages = run_checks(
            &Settings::default(),
            &Backends::default(),
            &AgentRegistry::new(),
        );
        assert!(messages.is_empty(), "{messages:?}");
    }

    #[test]
    fn unknown_keys_warn() {
        let settings = Settings::from_json_str(r#"{"SSE_TIMOUT": 5}"#).unwrap();
        let messages = run_checks(&settings, &Backends::default(), &AgentRegistry::new());
        assert_eq!(ids(&messages), vec!["agui.W001"]);
        assert!(!messages[0].is_error());
    }

    #[test]
    fn unknown_backend_keys_are_errors() {
        let settings = Settings {
            state_backend: Some("redis".into()),
            event_encoder: "ndjson".into(),
            ..Settings::default()
        };
        let messages = run_checks(&settings, &Backends::default(), &AgentRegistry::new());
        assert_eq!(ids(&messages), vec!["agui.E001", "agui.E001"]);
        assert!(messages[0].message.contains("redis"));
        assert!(messages[0].message.contains("file, memory"));
    }

    #[test]
    fn invalid_policies_and_origins_are_errors() {
        let settings = Settings {
            error_detail_policy: "verbose".into(),
            state_save_policy: "sometimes".into(),
            allowed_origins: Some(vec![String::new()]),
            ..Settings::default()
        };
        let messages = run_checks(&settings, &Backends::default(), &AgentRegistry::new());
        assert_eq!(ids(&messages), vec!["agui.E002", "agui.E004", "agui.E003"]);
        assert!(messages.iter().all(CheckMessage::is_error));
    }

    #[test]
    fn endpoint_configuration_is_checked() {
        let agents = AgentRegistry::new().with(
            "echo",
            AgentEndpoint::new(idle_agent()).with_config(
                EndpointConfig::default()
                    .with_auth_required(true)
                    .with_overrides(ExecutionOverrides::default().with_state_save_policy("never")),
            ),
        );
        let messages = run_checks(&Settings::default(), &Backends::default(), &agents);
        assert_eq!(ids(&messages), vec!["agui.E005", "agui.W002"]);
        assert!(messages[0].to_string().contains("\"echo\""));
    }
}
