//! Drives one agent run: preparation, lifecycle bracketing, keepalive and
//! timeout, error conversion and state persistence.

use crate::agent::{translate_events, Agent, EventTranslator, SystemMessageProvider};
use crate::config::{ExecutionConfig, StateSavePolicy};
use crate::context::RequestContext;
use crate::error::RunError;
use crate::keepalive::{with_keepalive, Tick};
use crate::state::StateStore;
use agui_protocol::{Event, Message, RunAgentInput, SseEncoder, StreamEncoder};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of a run drained in batch mode.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedRun {
    pub thread_id: String,
    pub run_id: String,
    pub events: Vec<Event>,
    #[serde(skip)]
    pub has_error: bool,
}

/// Last state seen during a run.
#[derive(Debug, Default)]
struct SnapshotTracker {
    last_state: Option<Value>,
    snapshot_seen: bool,
}

impl SnapshotTracker {
    fn new(initial: Option<Value>) -> Self {
        Self {
            last_state: initial.filter(|state| !state.is_null()),
            snapshot_seen: false,
        }
    }

    fn observe(&mut self, event: &Event) {
        if let Some(snapshot) = event.snapshot() {
            self.snapshot_seen = true;
            self.last_state = (!snapshot.is_null()).then(|| snapshot.clone());
        }
    }
}

/// One-shot coordinator for a single request. Build one per run.
pub struct RunCoordinator {
    agent: Arc<dyn Agent>,
    config: ExecutionConfig,
    request: RequestContext,
    translator: Option<Arc<dyn EventTranslator>>,
    system_message: Option<Arc<dyn SystemMessageProvider>>,
    state_store: Option<Arc<dyn StateStore>>,
    encoder: Arc<dyn StreamEncoder>,
}

impl RunCoordinator {
    pub fn new(agent: Arc<dyn Agent>, config: ExecutionConfig, request: RequestContext) -> Self {
        Self {
            agent,
            config,
            request,
            translator: None,
            system_message: None,
            state_store: None,
            encoder: Arc::new(SseEncoder),
        }
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Option<Arc<dyn EventTranslator>>) -> Self {
        self.translator = translator;
        self
    }

    #[must_use]
    pub fn with_system_message(
        mut self,
        provider: Option<Arc<dyn SystemMessageProvider>>,
    ) -> Self {
        self.system_message = provider;
        self
    }

    #[must_use]
    pub fn with_state_store(mut self, store: Option<Arc<dyn StateStore>>) -> Self {
        self.state_store = store;
        self
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn StreamEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn content_type(&self) -> &'static str {
        self.encoder.content_type()
    }

    /// Encoded packets of the run. The first failure is logged and becomes
    /// a single `RUN_ERROR` packet, after which the stream ends.
    pub fn stream(self, input: RunAgentInput) -> impl Stream<Item = Bytes> + Send + 'static {
        let input = input.ensure_ids();
        let thread_id = input.thread_id.clone();
        let run_id = input.run_id.clone();
        let encoder = self.encoder.clone();
        let detail = self.config.error_detail;
        let packets = self.packets(input);

        async_stream::stream! {
            let mut packets = Box::pin(packets);
            while let Some(packet) = packets.next().await {
                match packet {
                    Ok(packet) => yield packet,
                    Err(err) => {
                        tracing::error!(
                            error = %err,
                            thread_id = %thread_id,
                            run_id = %run_id,
                            "agent run failed"
                        );
                        match encoder.encode(&err.to_event(detail)) {
                            Ok(packet) => yield packet,
                            Err(encode_err) => {
                                tracing::error!(error = %encode_err, "failed to encode RUN_ERROR event");
                            }
                        }
                        break;
                    }
                }
            }
        }
    }

    fn packets(
        self,
        input: RunAgentInput,
    ) -> impl Stream<Item = Result<Bytes, RunError>> + Send + 'static {
        async_stream::try_stream! {
            let input = self.prepare(input).await?;
            let thread_id = input.thread_id.clone();
            let run_id = input.run_id.clone();
            let lifecycle = self.config.emit_run_lifecycle_events;

            if lifecycle {
                let started = Event::run_started(&thread_id, &run_id, input.parent_run_id.clone());
                yield self.encoder.encode(&started)?;
            }

            let mut tracker = SnapshotTracker::new(input.state.clone());
            let events = translate_events(
                self.agent.run(input, &self.request),
                self.translator.clone(),
            );
            let mut ticks = Box::pin(with_keepalive(
                events,
                self.config.keepalive_interval,
                self.config.timeout,
            ));
            while let Some(tick) = ticks.next().await {
                match tick? {
                    Tick::Event(event) => {
                        tracker.observe(&event);
                        yield self.encoder.encode(&event)?;
                    }
                    Tick::Keepalive => yield self.encoder.encode_keepalive(),
                }
            }

            if lifecycle {
                let finished = Event::run_finished(&thread_id, &run_id, tracker.last_state.clone());
                yield self.encoder.encode(&finished)?;
            }
            self.persist(&thread_id, &run_id, &tracker).await?;
        }
    }

    /// Drain the run into memory, bounded by the overall timeout.
    pub async fn collect(self, input: RunAgentInput) -> CollectedRun {
        let input = input.ensure_ids();
        let mut run = CollectedRun {
            thread_id: input.thread_id.clone(),
            run_id: input.run_id.clone(),
            events: Vec::new(),
            has_error: false,
        };
        if let Err(err) = self.collect_into(input, &mut run.events).await {
            tracing::error!(
                error = %err,
                thread_id = %run.thread_id,
                run_id = %run.run_id,
                "agent run failed"
            );
            run.events.push(err.to_event(self.config.error_detail));
            run.has_error = true;
        }
        run
    }

    async fn collect_into(
        &self,
        input: RunAgentInput,
        events: &mut Vec<Event>,
    ) -> Result<(), RunError> {
        let input = self.prepare(input).await?;
        let thread_id = input.thread_id.clone();
        let run_id = input.run_id.clone();
        let lifecycle = self.config.emit_run_lifecycle_events;

        if lifecycle {
            events.push(Event::run_started(
                &thread_id,
                &run_id,
                input.parent_run_id.clone(),
            ));
        }

        let mut tracker = SnapshotTracker::new(input.state.clone());
        let mut stream = translate_events(
            self.agent.run(input, &self.request),
            self.translator.clone(),
        );
        let drain = async {
            while let Some(event) = stream.next().await {
                let event = event?;
                tracker.observe(&event);
                events.push(event);
            }
            Ok::<(), RunError>(())
        };
        let timeout = self.config.timeout;
        if timeout.is_zero() {
            drain.await?;
        } else {
            tokio::time::timeout(timeout, drain)
                .await
                .map_err(|_| RunError::Timeout(timeout))??;
        }

        if lifecycle {
            events.push(Event::run_finished(
                &thread_id,
                &run_id,
                tracker.last_state.clone(),
            ));
        }
        self.persist(&thread_id, &run_id, &tracker).await
    }

    async fn prepare(&self, mut input: RunAgentInput) -> Result<RunAgentInput, RunError> {
        if let Some(provider) = &self.system_message {
            if let Some(text) = provider.system_message(&self.request).await? {
                if !text.is_empty() {
                    let id = format!("system-{}", input.run_id);
                    input.messages.insert(0, Message::system(text).with_id(id));
                }
            }
        }

        if input.state.is_none() {
            if let Some(store) = &self.state_store {
                input.state = store.load(&input.thread_id).await?;
                tracing::debug!(
                    thread_id = %input.thread_id,
                    found = input.state.is_some(),
                    "loaded thread state"
                );
            }
        }
        Ok(input)
    }

    async fn persist(
        &self,
        thread_id: &str,
        run_id: &str,
        tracker: &SnapshotTracker,
    ) -> Result<(), RunError> {
        let Some(store) = &self.state_store else {
            return Ok(());
        };
        match self.config.state_save_policy {
            StateSavePolicy::Disabled => return Ok(()),
            StateSavePolicy::OnSnapshot if !tracker.snapshot_seen => return Ok(()),
            StateSavePolicy::OnSnapshot | StateSavePolicy::Always => {}
        }

        match &tracker.last_state {
            Some(state) => store.save(thread_id, run_id, state).await?,
            None if store.supports_delete() => store.delete(thread_id).await?,
            None => {}
        }
        Ok(())
    }
}
