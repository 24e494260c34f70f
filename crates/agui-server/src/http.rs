use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::endpoint::AgentEndpoint;
use crate::registry::AgentSummary;
use crate::service::{ApiError, AppState};
use crate::{auth, cors, request, sse};

/// Health endpoint path.
pub const HEALTH_PATH: &str = "/health";
/// Agent listing path.
pub const AGENTS_PATH: &str = "/agents";
/// Streaming run endpoint path.
pub const AGENT_STREAM_PATH: &str = "/agents/:name";
/// Batch run endpoint path.
pub const AGENT_RUN_PATH: &str = "/agents/:name/run";

pub fn health_routes() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health))
}

pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route(AGENTS_PATH, get(list_agents))
        .route(AGENT_STREAM_PATH, post(stream_run).options(preflight))
        .route(AGENT_RUN_PATH, post(batch_run).options(preflight))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(agent_routes())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn list_agents(State(st): State<AppState>) -> Json<Vec<AgentSummary>> {
    Json(st.agents.summaries())
}

#[derive(Debug, Clone, Copy)]
enum RunMode {
    Stream,
    Batch,
}

fn origin_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Allow-list for an endpoint, falling back to the global one.
fn allowed_origins(
    st: &AppState,
    endpoint: Option<&AgentEndpoint>,
) -> Result<Option<Vec<String>>, ApiError> {
    let endpoint_origins = endpoint.and_then(|e| e.config().allowed_origins.as_deref());
    Ok(st.settings.resolve_allowed_origins(endpoint_origins)?)
}

async fn preflight(
    State(st): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let origin = origin_of(&headers);
    let endpoint = st.agents.get(&name);
    let allowed = match allowed_origins(&st, endpoint.as_deref()) {
        Ok(allowed) => allowed,
        Err(err) => return err.into_response(),
    };
    let mut response = match endpoint {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => ApiError::AgentNotFound(name).into_response(),
    };
    cors::apply_cors(response.headers_mut(), origin.as_deref(), allowed.as_deref());
    response
}

async fn stream_run(
    State(st): State<AppState>,
    Path(name): Path<String>,
    req: Request,
) -> Response {
    handle_run(st, name, req, RunMode::Stream).await
}

async fn batch_run(
    State(st): State<AppState>,
    Path(name): Path<String>,
    req: Request,
) -> Response {
    handle_run(st, name, req, RunMode::Batch).await
}

async fn handle_run(st: AppState, name: String, req: Request, mode: RunMode) -> Response {
    let origin = origin_of(req.headers());
    let endpoint = st.agents.get(&name);
    let allowed = match allowed_origins(&st, endpoint.as_deref()) {
        Ok(allowed) => allowed,
        Err(err) => return err.into_response(),
    };

    let result = match endpoint.as_deref() {
        Some(endpoint) => {
            execute(
                &st,
                endpoint,
                origin.as_deref(),
                allowed.as_deref(),
                req,
                mode,
            )
            .await
        }
        None => Err(ApiError::AgentNotFound(name)),
    };
    let mut response = result.unwrap_or_else(IntoResponse::into_response);
    cors::apply_cors(response.headers_mut(), origin.as_deref(), allowed.as_deref());
    response
}

/// Gates in order: origin, auth, content type, size, body decode.
async fn execute(
    st: &AppState,
    endpoint: &AgentEndpoint,
    origin: Option<&str>,
    allowed: Option<&[String]>,
    req: Request,
    mode: RunMode,
) -> Result<Response, ApiError> {
    if !cors::is_origin_allowed(origin, allowed) {
        tracing::debug!(origin, "rejected request from disallowed origin");
        return Err(ApiError::request(
            StatusCode::FORBIDDEN,
            "Origin not allowed",
        ));
    }

    let (parts, body) = req.into_parts();
    let path = parts.uri.path();
    let auth_required = endpoint.config().auth_required || st.settings.require_authentication;
    let principal =
        auth::authenticate_request(st.auth.as_deref(), auth_required, &parts.headers, path)?;

    request::ensure_json_content_type(&parts.headers)?;
    request::enforce_max_content_length(&parts.headers, st.settings.max_content_length)?;
    let body = request::read_body(body, st.settings.max_content_length).await?;
    let input = request::parse_run_input(&body)?;

    let ctx = request::request_context(path, &parts.headers, principal);
    let coordinator = endpoint.coordinator(st, ctx)?;
    tracing::info!(
        path,
        thread_id = %input.thread_id,
        run_id = %input.run_id,
        mode = ?mode,
        "starting agent run"
    );

    let response = match mode {
        RunMode::Stream => sse::sse_response(coordinator.content_type(), coordinator.stream(input)),
        RunMode::Batch => {
            let run = coordinator.collect(input).await;
            let status = if run.has_error {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            (status, Json(run)).into_response()
        }
    };
    Ok(response)
}
