//! Lazy translation of a vendor's NDJSON line stream into canonical events.
//!
//! Both vendor adapters share the same driving loop: pull one wire line,
//! decode it, hand it to the adapter, forward whatever canonical events come
//! out. What differs per vendor lives behind [`WireAdapter`].

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;

use super::errors::{classified_message, ProviderError};
use super::types::{CanonicalEvent, EventStream};

/// Raw output lines of a vendor process, or the error that ended them.
pub type WireStream<'a> = BoxStream<'a, Result<String, ProviderError>>;

/// Per-invocation translator from one vendor's wire events to canonical events.
pub trait WireAdapter: Send {
    /// Decoded shape of one wire line.
    type Wire: DeserializeOwned + Send;

    /// Name used in log lines.
    const LABEL: &'static str;

    /// Translates one decoded wire event.
    fn on_event(&mut self, event: Self::Wire) -> Vec<CanonicalEvent>;

    /// True once the adapter has produced the turn's terminal event. No
    /// further wire lines are read after that.
    fn finished(&self) -> bool;

    /// Called when reading the wire fails. The stream ends afterwards.
    fn on_error(&mut self, error: &ProviderError) -> Vec<CanonicalEvent> {
        vec![CanonicalEvent::failure(vec![classified_message(error)])]
    }

    /// Called when the wire ends on its own.
    fn on_end(&mut self) -> Vec<CanonicalEvent> {
        if self.finished() {
            Vec::new()
        } else {
            vec![CanonicalEvent::synthetic_result()]
        }
    }
}

struct TranslateState<'a, A> {
    wire: WireStream<'a>,
    adapter: A,
    queue: VecDeque<CanonicalEvent>,
    done: bool,
}

/// Drives `adapter` over `wire`, yielding canonical events as they are produced.
///
/// Blank lines are ignored and lines that fail to decode are logged and
/// skipped. The returned stream always ends with exactly one terminal event
/// produced by the adapter.
pub fn translate<'a, A>(wire: WireStream<'a>, adapter: A) -> EventStream<'a>
where
    A: WireAdapter + 'a,
{
    let state = TranslateState {
        wire,
        adapter,
        queue: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.queue.pop_front() {
                return Some((event, state));
            }
            if state.done {
                return None;
            }
            if state.adapter.finished() {
                state.done = true;
                continue;
            }

            match state.wire.next().await {
                Some(Ok(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<A::Wire>(trimmed) {
                        Ok(event) => {
                            let events = state.adapter.on_event(event);
                            state.queue.extend(events);
                        }
                        Err(err) => {
                            log::warn!("[{}] skipping undecodable line: {}", A::LABEL, err);
                            log::debug!("[{}] line: {}", A::LABEL, trimmed);
                        }
                    }
                }
                Some(Err(err)) => {
                    log::warn!("[{}] stream failed: {}", A::LABEL, err);
                    let events = state.adapter.on_error(&err);
                    state.queue.extend(events);
                    state.done = true;
                }
                None => {
                    let events = state.adapter.on_end();
                    state.queue.extend(events);
                    state.done = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// Echoes `{"text": ...}` lines and finishes on `{"done": true}`.
    #[derive(Default)]
    struct EchoAdapter {
        finished: bool,
    }

    impl WireAdapter for EchoAdapter {
        type Wire = Value;
        const LABEL: &'static str = "echo";

        fn on_event(&mut self, event: Value) -> Vec<CanonicalEvent> {
            if event.get("done").is_some() {
                self.finished = true;
                return vec![CanonicalEvent::success(Default::default())];
            }
            event
                .get("text")
                .and_then(Value::as_str)
                .map(|text| vec![CanonicalEvent::text(text)])
                .unwrap_or_default()
        }

        fn finished(&self) -> bool {
            self.finished
        }
    }

    fn wire(lines: Vec<Result<String, ProviderError>>) -> WireStream<'static> {
        stream::iter(lines).boxed()
    }

    fn line(value: Value) -> Result<String, ProviderError> {
        Ok(value.to_string())
    }

    #[tokio::test]
    async fn synthesizes_result_when_wire_ends_early() {
        let events: Vec<_> = translate(
            wire(vec![line(json!({"text": "hi"}))]),
            EchoAdapter::default(),
        )
        .collect()
        .await;

        assert_eq!(
            events,
            vec![CanonicalEvent::text("hi"), CanonicalEvent::synthetic_result()]
        );
    }

    #[tokio::test]
    async fn stops_reading_after_terminal_event() {
        let events: Vec<_> = translate(
            wire(vec![
                line(json!({"done": true})),
                line(json!({"text": "late"})),
            ]),
            EchoAdapter::default(),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 1);
        assert!(events[0].is_result());
    }

    #[tokio::test]
    async fn skips_blank_and_undecodable_lines() {
        let events: Vec<_> = translate(
            wire(vec![
                Ok("   ".to_string()),
                Ok("{not json".to_string()),
                line(json!({"text": "kept"})),
                line(json!({"done": true})),
            ]),
            EchoAdapter::default(),
        )
        .collect()
        .await;

        assert_eq!(events[0], CanonicalEvent::text("kept"));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn wire_error_becomes_classified_failure() {
        let events: Vec<_> = translate(
            wire(vec![
                line(json!({"text": "partial"})),
                Err(ProviderError::vendor("HTTP 401 Unauthorized")),
                line(json!({"text": "never"})),
            ]),
            EchoAdapter::default(),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        match &events[1] {
            CanonicalEvent::Result {
                success: false,
                errors,
                ..
            } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("Authentication failed"));
            }
            other => panic!("expected failure result, got {other:?}"),
        }
    }
}
