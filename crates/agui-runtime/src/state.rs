use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid thread id: {0}")]
    InvalidId(String),

    #[error("state backend does not support {0}")]
    Unsupported(&'static str),

    #[error("state backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StateStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Persistence of opaque per-thread agent state.
///
/// Payloads are stored and returned unchanged. Concurrent runs on the same
/// thread race; the last writer wins.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored state for a thread, `None` when nothing was saved.
    async fn load(&self, thread_id: &str) -> Result<Option<Value>, StateStoreError>;

    async fn save(&self, thread_id: &str, run_id: &str, state: &Value)
        -> Result<(), StateStoreError>;

    /// Whether [`StateStore::delete`] is implemented.
    fn supports_delete(&self) -> bool {
        false
    }

    async fn delete(&self, _thread_id: &str) -> Result<(), StateStoreError> {
        Err(StateStoreError::Unsupported("delete"))
    }
}
