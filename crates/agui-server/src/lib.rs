//! HTTP gateway exposing AG-UI agents as SSE and batch endpoints.

pub mod auth;
pub mod backends;
pub mod checks;
pub mod cors;
pub mod endpoint;
pub mod http;
pub mod registry;
pub mod request;
pub mod service;
pub mod sse;

pub use auth::{AuthBackend, BearerTokenAuth};
pub use backends::Backends;
pub use endpoint::{AgentEndpoint, EndpointConfig};
pub use registry::{AgentRegistry, AgentSummary};
pub use service::{ApiError, AppState};
