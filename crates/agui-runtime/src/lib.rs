//! Run coordinator for AG-UI agents.
//!
//! An [`Agent`] produces protocol events; a [`RunCoordinator`] wraps them in
//! lifecycle events, keeps idle connections alive, enforces the run timeout,
//! turns failures into a terminal `RUN_ERROR` and persists the final state
//! through a [`StateStore`].

pub mod agent;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod keepalive;
pub mod registry;
pub mod state;

pub use agent::{
    event_stream, events_from_iter, translate_events, Agent, EventStream, EventTranslator,
    IdentityTranslator, StaticSystemMessage, SystemMessageProvider,
};
pub use config::{
    resolve_error_policy, resolve_state_save_policy, AuthToken, ConfigError, ErrorDetail,
    ExecutionConfig, ExecutionOverrides, Settings, StateSavePolicy,
};
pub use context::{Principal, RequestContext};
pub use coordinator::{CollectedRun, RunCoordinator};
pub use error::{RunError, SAFE_ERROR_MESSAGE, TIMEOUT_CODE};
pub use keepalive::{with_keepalive, Tick};
pub use registry::BackendRegistry;
pub use state::{StateStore, StateStoreError};
