#![allow(dead_code)]

use agui_protocol::{Event, RunAgentInput};
use agui_runtime::{events_from_iter, Agent, EventStream, RequestContext};
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Response parts collected from one request.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("response body should be JSON")
    }

    /// Decoded SSE `data:` frames.
    pub fn frames(&self) -> Vec<Value> {
        self.body
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).expect("data frame should be JSON"))
            .collect()
    }

    pub fn frame_types(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: axum::Router, request: Request<Body>) -> Reply {
    let resp = app
        .oneshot(request)
        .await
        .expect("app should handle request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    Reply {
        status,
        headers,
        body: String::from_utf8(body.to_vec()).expect("response body should be UTF-8"),
    }
}

/// JSON POST with optional extra headers.
pub fn post_json(uri: &str, payload: &Value, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(payload.to_string()))
        .expect("request build should succeed")
}

pub fn run_payload(thread_id: &str, text: &str) -> Value {
    json!({
        "threadId": thread_id,
        "runId": format!("run-{thread_id}"),
        "messages": [{"id": "m1", "role": "user", "content": text}]
    })
}

/// Replies with the last user message and counts invocations.
pub fn counting_echo() -> (Arc<dyn Agent>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let agent: Arc<dyn Agent> =
        Arc::new(move |input: RunAgentInput, _ctx: &RequestContext| -> EventStream {
            seen.fetch_add(1, Ordering::SeqCst);
            let reply = input.last_user_message().unwrap_or_default().to_string();
            events_from_iter([
                Event::text_message_start("m1"),
                Event::text_message_content("m1", reply),
                Event::text_message_end("m1"),
            ])
        });
    (agent, calls)
}

/// Replies with the authenticated principal id, or `anonymous`.
pub fn whoami() -> Arc<dyn Agent> {
    Arc::new(|_input: RunAgentInput, ctx: &RequestContext| -> EventStream {
        let who = ctx
            .principal
            .as_ref()
            .map_or("anonymous".to_string(), |p| p.id.clone());
        events_from_iter([Event::custom("whoami", json!(who))])
    })
}

/// Increments `count` in the incoming state.
pub fn counter() -> Arc<dyn Agent> {
    Arc::new(|input: RunAgentInput, _ctx: &RequestContext| -> EventStream {
        let count = input
            .state
            .as_ref()
            .and_then(|state| state["count"].as_i64())
            .unwrap_or(0);
        events_from_iter([Event::state_snapshot(json!({"count": count + 1}))])
    })
}

pub fn failing() -> Arc<dyn Agent> {
    Arc::new(|_input: RunAgentInput, _ctx: &RequestContext| -> EventStream {
        agui_runtime::event_stream(futures::stream::iter([Err(
            agui_runtime::RunError::agent("database unreachable"),
        )]))
    })
}
