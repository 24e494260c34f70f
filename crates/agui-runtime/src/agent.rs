//! Capabilities supplied by the application: the agent itself, an optional
//! event translator and an optional system message hook.

use crate::context::RequestContext;
use crate::error::RunError;
use agui_protocol::{Event, RunAgentInput};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Finite, lazily produced sequence of protocol events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, RunError>> + Send>>;

/// Box any event stream.
pub fn event_stream<S>(stream: S) -> EventStream
where
    S: Stream<Item = Result<Event, RunError>> + Send + 'static,
{
    Box::pin(stream)
}

/// Stream that yields the given events and ends.
pub fn events_from_iter(events: impl IntoIterator<Item = Event>) -> EventStream {
    let events: Vec<Event> = events.into_iter().collect();
    Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
}

/// Produces the events of one run. A returned stream is consumed once.
pub trait Agent: Send + Sync {
    fn run(&self, input: RunAgentInput, ctx: &RequestContext) -> EventStream;
}

impl<F> Agent for F
where
    F: Fn(RunAgentInput, &RequestContext) -> EventStream + Send + Sync,
{
    fn run(&self, input: RunAgentInput, ctx: &RequestContext) -> EventStream {
        self(input, ctx)
    }
}

/// Maps one agent event to zero or more protocol events.
pub trait EventTranslator: Send + Sync {
    fn translate(&self, event: Event) -> EventStream;
}

impl<F> EventTranslator for F
where
    F: Fn(Event) -> EventStream + Send + Sync,
{
    fn translate(&self, event: Event) -> EventStream {
        self(event)
    }
}

/// Pass-through translator.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl EventTranslator for IdentityTranslator {
    fn translate(&self, event: Event) -> EventStream {
        events_from_iter([event])
    }
}

/// Supplies an optional system prompt for a request.
#[async_trait]
pub trait SystemMessageProvider: Send + Sync {
    async fn system_message(&self, ctx: &RequestContext) -> Result<Option<String>, RunError>;
}

/// Same system prompt for every request.
#[derive(Debug, Clone)]
pub struct StaticSystemMessage(pub String);

#[async_trait]
impl SystemMessageProvider for StaticSystemMessage {
    async fn system_message(&self, _ctx: &RequestContext) -> Result<Option<String>, RunError> {
        Ok(Some(self.0.clone()))
    }
}

/// Flatten agent events through a translator; `None` forwards them as is.
pub fn translate_events(
    events: EventStream,
    translator: Option<Arc<dyn EventTranslator>>,
) -> EventStream {
    let Some(translator) = translator else {
        return events;
    };
    Box::pin(async_stream::try_stream! {
        let mut events = events;
        while let Some(event) = events.next().await {
            let mut translated = translator.translate(event?);
            while let Some(out) = translated.next().await {
                yield out?;
            }
        }
    })
}
