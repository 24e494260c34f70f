use agui_runtime::{StateStore, StateStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

/// On-disk document, one per thread.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDocument {
    thread_id: String,
    run_id: String,
    state: Value,
    /// Milliseconds since epoch.
    updated_at: u64,
}

/// Stores each thread's state as `<base>/<thread_id>.json`.
pub struct FileStateStore {
    base_path: PathBuf,
}

impl FileStateStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn thread_path(&self, thread_id: &str) -> Result<PathBuf, StateStoreError> {
        validate_thread_id(thread_id)?;
        Ok(self.base_path.join(format!("{thread_id}.json")))
    }

    async fn write_atomic(&self, thread_id: &str, content: &[u8]) -> Result<(), StateStoreError> {
        if !self.base_path.exists() {
            tokio::fs::create_dir_all(&self.base_path).await?;
        }
        let path = self.thread_path(thread_id)?;
        let tmp_path = self.base_path.join(format!(
            ".{thread_id}.{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StateStoreError::Io(err));
        }
        Ok(())
    }
}

/// Rejects ids that could escape the base directory.
fn validate_thread_id(thread_id: &str) -> Result<(), StateStoreError> {
    if thread_id.is_empty() {
        return Err(StateStoreError::InvalidId(
            "thread id cannot be empty".to_string(),
        ));
    }
    if thread_id.contains('/') || thread_id.contains('\\') || thread_id.contains("..") {
        return Err(StateStoreError::InvalidId(format!(
            "thread id contains invalid characters: {thread_id:?}"
        )));
    }
    if thread_id.chars().any(char::is_control) {
        return Err(StateStoreError::InvalidId(format!(
            "thread id contains control characters: {thread_id:?}"
        )));
    }
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Value>, StateStoreError> {
        let path = self.thread_path(thread_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let document: StateDocument = serde_json::from_str(&content)?;
        Ok(Some(document.state))
    }

    async fn save(
        &self,
        thread_id: &str,
        run_id: &str,
        state: &Value,
    ) -> Result<(), StateStoreError> {
        let document = StateDocument {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            state: state.clone(),
            updated_at: now_millis(),
        };
        let content = serde_json::to_vec_pretty(&document)?;
        self.write_atomic(thread_id, &content).await?;
        tracing::debug!(thread_id, run_id, "saved thread state");
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        true
    }

    async fn delete(&self, thread_id: &str) -> Result<(), StateStoreError> {
        let path = self.thread_path(thread_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
