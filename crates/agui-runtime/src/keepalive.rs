use crate::agent::EventStream;
use crate::error::RunError;
use agui_protocol::Event;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

/// Item of an agent stream raced against the keepalive timer.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Event(Event),
    /// No event arrived within the keepalive interval.
    Keepalive,
}

enum Step {
    Item(Option<Result<Event, RunError>>),
    Idle,
}

/// Race each pending event against `min(keepalive, remaining)`.
///
/// A zero `keepalive` never emits keepalives and a zero `timeout` never
/// expires. When the deadline passes the agent stream is dropped and
/// [`RunError::Timeout`] ends the stream. Only one fetch from `events`
/// is ever pending; an idle tick keeps waiting on it.
pub fn with_keepalive(
    events: EventStream,
    keepalive: Duration,
    timeout: Duration,
) -> impl Stream<Item = Result<Tick, RunError>> + Send + 'static {
    async_stream::stream! {
        let mut events = events;

        if keepalive.is_zero() && timeout.is_zero() {
            while let Some(item) = events.next().await {
                let failed = item.is_err();
                yield item.map(Tick::Event);
                if failed {
                    return;
                }
            }
            return;
        }

        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if keepalive.is_zero() {
                        remaining
                    } else {
                        keepalive.min(remaining)
                    }
                }
                None => keepalive,
            };

            let step = tokio::select! {
                item = events.next() => Step::Item(item),
                _ = tokio::time::sleep(wait) => Step::Idle,
            };

            match step {
                Step::Item(Some(Ok(event))) => yield Ok(Tick::Event(event)),
                Step::Item(Some(Err(err))) => {
                    yield Err(err);
                    return;
                }
                Step::Item(None) => return,
                Step::Idle => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        drop(events);
                        yield Err(RunError::Timeout(timeout));
                        return;
                    }
                    yield Ok(Tick::Keepalive);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{event_stream, events_from_iter};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn delayed(delays: Vec<u64>) -> EventStream {
        event_stream(async_stream::stream! {
            for (i, delay) in delays.into_iter().enumerate() {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                yield Ok::<Event, RunError>(Event::text_message_content("m", i.to_string()));
            }
        })
    }

    async fn drain(
        stream: impl Stream<Item = Result<Tick, RunError>>,
    ) -> Vec<Result<Tick, RunError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn disabled_timers_forward_events() {
        let out = drain(with_keepalive(
            events_from_iter([Event::text_message_end("m")]),
            Duration::ZERO,
            Duration::ZERO,
        ))
        .await;
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Ok(Tick::Event(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_gaps_produce_keepalives_without_losing_events() {
        let out = drain(with_keepalive(
            delayed(vec![2500, 10]),
            Duration::from_secs(1),
            Duration::ZERO,
        ))
        .await;
        let ticks: Vec<Tick> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            ticks,
            vec![
                Tick::Keepalive,
                Tick::Keepalive,
                Tick::Event(Event::text_message_content("m", "0")),
                Tick::Event(Event::text_message_content("m", "1")),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_agent_stream() {
        let out = drain(with_keepalive(
            delayed(vec![100, 5000]),
            Duration::ZERO,
            Duration::from_secs(1),
        ))
        .await;
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Ok(Tick::Event(_))));
        assert!(matches!(&out[1], Err(RunError::Timeout(d)) if *d == Duration::from_secs(1)));
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_drops_pending_fetch_before_reporting() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let events = event_stream(async_stream::stream! {
            let _flag = flag;
            tokio::time::sleep(Duration::from_secs(60)).await;
            yield Ok::<Event, RunError>(Event::text_message_end("m"));
        });

        let mut ticks = Box::pin(with_keepalive(
            events,
            Duration::ZERO,
            Duration::from_secs(1),
        ));
        let first = ticks.next().await;
        assert!(matches!(first, Some(Err(RunError::Timeout(_)))));
        assert!(dropped.load(Ordering::SeqCst));
        assert!(ticks.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalives_stop_at_deadline() {
        let out = drain(with_keepalive(
            delayed(vec![10_000]),
            Duration::from_secs(2),
            Duration::from_secs(5),
        ))
        .await;
        let keepalives = out
            .iter()
            .filter(|item| matches!(item, Ok(Tick::Keepalive)))
            .count();
        assert_eq!(keepalives, 2);
        assert!(matches!(out.last(), Some(Err(RunError::Timeout(_)))));
    }

    #[tokio::test]
    async fn agent_error_ends_stream() {
        let events = event_stream(futures::stream::iter(vec![
            Err(RunError::agent("boom")),
            Ok(Event::text_message_end("m")),
        ]));
        let out = drain(with_keepalive(events, Duration::from_secs(1), Duration::ZERO)).await;
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Err(RunError::Agent(msg)) if msg == "boom"));
    }
}
