use agui_protocol::{Event, RunAgentInput};
use agui_runtime::{
    event_stream, events_from_iter, Agent, EventStream, RequestContext, RunError, Settings,
};
use agui_server::checks::{run_checks, Severity};
use agui_server::{http, AgentEndpoint, AgentRegistry, AppState, Backends, EndpointConfig};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "agui-server")]
struct Args {
    #[arg(long, env = "AGUI_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// JSON file with `settings` and per-agent `agents` sections.
    #[arg(long, env = "AGUI_CONFIG")]
    config: Option<PathBuf>,

    /// Expose full error details when ERROR_DETAIL_POLICY is "auto".
    #[arg(long, env = "AGUI_DEBUG")]
    debug: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    agents: HashMap<String, EndpointConfig>,
}

fn load_config(path: Option<&PathBuf>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read config");
            std::process::exit(2);
        }
    };
    match serde_json::from_str::<Config>(&raw) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to parse config (JSON)");
            std::process::exit(2);
        }
    }
}

/// Replies with the last user message.
fn echo_agent() -> Arc<dyn Agent> {
    Arc::new(|input: RunAgentInput, _ctx: &RequestContext| -> EventStream {
        let message_id = format!("msg-{}", input.run_id);
        let reply = input.last_user_message().unwrap_or_default().to_string();
        events_from_iter([
            Event::text_message_start(&message_id),
            Event::text_message_content(&message_id, reply),
            Event::text_message_end(&message_id),
        ])
    })
}

/// Streams the last user message word by word with a pause between words.
fn slow_echo_agent() -> Arc<dyn Agent> {
    Arc::new(|input: RunAgentInput, _ctx: &RequestContext| -> EventStream {
        let message_id = format!("msg-{}", input.run_id);
        let words: Vec<String> = input
            .last_user_message()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        event_stream(async_stream::stream! {
            yield Ok::<Event, RunError>(Event::text_message_start(&message_id));
            for (i, word) in words.into_iter().enumerate() {
                tokio::time::sleep(Duration::from_millis(250)).await;
                let delta = if i == 0 { word } else { format!(" {word}") };
                yield Ok(Event::text_message_content(&message_id, delta));
            }
            yield Ok(Event::text_message_end(&message_id));
        })
    })
}

/// Increments `count` in the thread state on every run.
fn counter_agent() -> Arc<dyn Agent> {
    Arc::new(|input: RunAgentInput, _ctx: &RequestContext| -> EventStream {
        let count = input
            .state
            .as_ref()
            .and_then(|state| state.get("count"))
            .and_then(|count| count.as_i64())
            .unwrap_or(0)
            + 1;
        let message_id = format!("msg-{}", input.run_id);
        events_from_iter([
            Event::text_message_start(&message_id),
            Event::text_message_content(&message_id, format!("count is now {count}")),
            Event::text_message_end(&message_id),
            Event::state_snapshot(json!({ "count": count })),
        ])
    })
}

/// Always fails after starting a message.
fn failing_agent() -> Arc<dyn Agent> {
    Arc::new(|input: RunAgentInput, _ctx: &RequestContext| -> EventStream {
        let message_id = format!("msg-{}", input.run_id);
        event_stream(futures::stream::iter([
            Ok(Event::text_message_start(message_id)),
            Err(RunError::agent("this agent always fails")),
        ]))
    })
}

fn build_agents(mut configs: HashMap<String, EndpointConfig>) -> AgentRegistry {
    let demos = [
        ("echo", "Echoes the last user message", echo_agent()),
        ("slow-echo", "Streams the last user message word by word", slow_echo_agent()),
        ("counter", "Counts runs per thread in agent state", counter_agent()),
        ("failing", "Fails every run", failing_agent()),
    ];

    let mut agents = AgentRegistry::new();
    for (name, description, agent) in demos {
        let mut config = configs.remove(name).unwrap_or_default();
        if config.description.is_empty() {
            config.description = description.to_string();
        }
        agents.register(name, AgentEndpoint::new(agent).with_config(config));
    }
    for name in configs.keys() {
        tracing::warn!(agent = %name, "config for unknown agent ignored");
    }
    agents
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agui_server=info,agui_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut cfg = load_config(args.config.as_ref());
    if args.debug {
        cfg.settings.debug = true;
    }

    let backends = Backends::default();
    let agents = build_agents(cfg.agents);

    let messages = run_checks(&cfg.settings, &backends, &agents);
    for message in &messages {
        match message.severity {
            Severity::Warning => tracing::warn!(id = message.id, "{}", message.message),
            Severity::Error => tracing::error!(id = message.id, "{}", message.message),
        }
    }
    if messages.iter().any(|m| m.is_error()) {
        std::process::exit(2);
    }

    let state = match AppState::from_settings(cfg.settings, agents, &backends) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to build backends");
            std::process::exit(2);
        }
    };
    tracing::info!(
        agents = state.agents.len(),
        state_backend = state.settings.state_backend.as_deref().unwrap_or("none"),
        "agent registry ready"
    );

    let app = http::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&args.http_addr)
        .await
        .expect("failed to bind http listener");
    tracing::info!(addr = %args.http_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("http server crashed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutting down");
}
