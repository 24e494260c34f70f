use crate::auth::AuthBackend;
use crate::backends::Backends;
use crate::registry::AgentRegistry;
use agui_protocol::{RequestError, SseEncoder, StreamEncoder};
use agui_runtime::{ConfigError, Settings, StateStore};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

/// Shared per-process state. Backends are instantiated once at startup.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub agents: Arc<AgentRegistry>,
    pub auth: Option<Arc<dyn AuthBackend>>,
    pub state_store: Option<Arc<dyn StateStore>>,
    pub encoder: Arc<dyn StreamEncoder>,
}

impl AppState {
    /// State without auth or persistence, using the SSE encoder.
    pub fn new(settings: Settings, agents: AgentRegistry) -> Self {
        Self {
            settings: Arc::new(settings),
            agents: Arc::new(agents),
            auth: None,
            state_store: None,
            encoder: Arc::new(SseEncoder),
        }
    }

    /// Build every backend named in `settings` from `backends`.
    pub fn from_settings(
        settings: Settings,
        agents: AgentRegistry,
        backends: &Backends,
    ) -> Result<Self, ConfigError> {
        let auth = backends
            .auth
            .build_optional(settings.auth_backend.as_deref(), &settings)?;
        let state_store = backends
            .state
            .build_optional(settings.state_backend.as_deref(), &settings)?;
        let encoder = backends.encoder.build(&settings.event_encoder, &settings)?;
        Ok(Self {
            auth,
            state_store,
            encoder,
            ..Self::new(settings, agents)
        })
    }

    #[must_use]
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Rejected by a request gate; the message is shown to the client.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    /// Server misconfiguration; details are logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AgentNotFound(_) => StatusCode::NOT_FOUND,
            Self::Request { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self::request(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let msg = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed on server configuration");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(serde_json::json!({ "error": msg }));
        (self.status(), body).into_response()
    }
}
