//! Built-in backends selectable by key from [`Settings`].

use crate::auth::{AuthBackend, BearerTokenAuth};
use agui_protocol::{SseEncoder, StreamEncoder};
use agui_runtime::{BackendRegistry, Settings, StateStore};
use agui_store_adapters::{FileStateStore, MemoryStateStore};
use std::sync::Arc;

pub struct Backends {
    pub auth: BackendRegistry<dyn AuthBackend>,
    pub state: BackendRegistry<dyn StateStore>,
    pub encoder: BackendRegistry<dyn StreamEncoder>,
}

impl Default for Backends {
    /// `bearer` auth, `memory` and `file` state, `sse` encoder.
    fn default() -> Self {
        let auth = BackendRegistry::new("auth").with("bearer", |settings: &Settings| {
            Ok(Arc::new(BearerTokenAuth::new(&settings.auth_tokens)) as Arc<dyn AuthBackend>)
        });
        let state = BackendRegistry::new("state")
            .with("memory", |_settings: &Settings| {
                Ok(Arc::new(MemoryStateStore::new()) as Arc<dyn StateStore>)
            })
            .with("file", |settings: &Settings| {
                Ok(Arc::new(FileStateStore::new(&settings.state_dir)) as Arc<dyn StateStore>)
            });
        let encoder = BackendRegistry::new("event encoder").with("sse", |_settings: &Settings| {
            Ok(Arc::new(SseEncoder) as Arc<dyn StreamEncoder>)
        });
        Self {
            auth,
            state,
            encoder,
        }
    }
}
