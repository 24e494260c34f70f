use agui_runtime::{StateStore, StateStoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

struct MemoryEntry {
    state: Value,
    run_id: String,
}

/// In-memory state for tests and local development. Lost on restart.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: tokio::sync::RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run that last wrote the thread's state.
    pub async fn last_run_id(&self, thread_id: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(thread_id)
            .map(|entry| entry.run_id.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Value>, StateStoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(thread_id).map(|entry| entry.state.clone()))
    }

    async fn save(
        &self,
        thread_id: &str,
        run_id: &str,
        state: &Value,
    ) -> Result<(), StateStoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            thread_id.to_string(),
            MemoryEntry {
                state: state.clone(),
                run_id: run_id.to_string(),
            },
        );
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        true
    }

    async fn delete(&self, thread_id: &str) -> Result<(), StateStoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(thread_id);
        Ok(())
    }
}
