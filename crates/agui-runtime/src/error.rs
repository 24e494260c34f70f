use crate::config::ErrorDetail;
use crate::state::StateStoreError;
use agui_protocol::{EncodeError, Event};
use std::time::Duration;

/// Client-facing message used when error details are hidden.
pub const SAFE_ERROR_MESSAGE: &str = "Agent execution failed";

/// `RUN_ERROR` code attached to timeouts.
pub const TIMEOUT_CODE: &str = "timeout";

/// Failure of a single run. Caught once by the coordinator and turned
/// into a terminal `RUN_ERROR` event.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{0}")]
    Agent(String),

    #[error("event translation failed: {0}")]
    Translate(String),

    #[error("system message hook failed: {0}")]
    SystemMessage(String),

    #[error(transparent)]
    State(#[from] StateStoreError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("agent stream timed out after {0:?}")]
    Timeout(Duration),
}

impl RunError {
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent(message.into())
    }

    pub fn translate(message: impl Into<String>) -> Self {
        Self::Translate(message.into())
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Timeout(_) => Some(TIMEOUT_CODE),
            _ => None,
        }
    }

    pub fn client_message(&self, detail: ErrorDetail) -> String {
        match detail {
            ErrorDetail::Full => self.to_string(),
            ErrorDetail::Safe => SAFE_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn to_event(&self, detail: ErrorDetail) -> Event {
        Event::run_error(self.client_message(detail), self.code().map(str::to_string))
    }
}
