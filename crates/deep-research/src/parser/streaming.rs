//! Incremental decoding of a streamed structured response

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

use super::partial_json::parse_partial_json;
use crate::llm::{LlmEvent, LlmEventStream};

/// One item of a [`DecodeStream`]
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent<T> {
    /// The accumulated text decoded into a value that passed the predicate
    Object(T),
    /// Reasoning delta, forwarded unchanged
    Reasoning(String),
    /// The upstream failed; nothing follows
    Error(String),
    /// The upstream ended but the full text never decoded
    BadTerminalState,
}

/// Lazy sequence of [`DecodeEvent`]s
pub struct DecodeStream<T> {
    inner: Pin<Box<dyn Stream<Item = DecodeEvent<T>> + Send>>,
}

impl<T> DecodeStream<T> {
    /// Wrap any compatible stream, e.g. a mapped decode stream
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DecodeEvent<T>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl<T> Stream for DecodeStream<T> {
    type Item = DecodeEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for DecodeStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeStream").finish_non_exhaustive()
    }
}

/// Remove markdown code fences around a JSON payload
///
/// Handles a leading ```` ```json ````, a bare ```` ``` ````, a leading
/// `json` word, and a trailing ```` ``` ````.
pub fn strip_json_markdown(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Decode the accumulated buffer into `T`, if it is structurally complete
fn decode_buffer<T: DeserializeOwned>(buffer: &str) -> Option<T> {
    let value = parse_partial_json(strip_json_markdown(buffer)).into_value()?;
    serde_json::from_value(value).ok()
}

struct DecodeState<P> {
    events: LlmEventStream,
    buffer: String,
    is_valid: P,
    last_decode_ok: bool,
    done: bool,
}

/// Turn a streamed model response into decoded partial values
///
/// Every text delta is appended to a buffer which is then decoded as a
/// whole. A value is emitted only when the decode succeeds and `is_valid`
/// accepts it; other chunks are dropped. Reasoning passes through. An
/// upstream error is forwarded once and ends the stream. If the stream ends
/// while the last decode attempt failed, a single
/// [`DecodeEvent::BadTerminalState`] is emitted.
pub fn parse_streaming_json<T, P>(events: LlmEventStream, is_valid: P) -> DecodeStream<T>
where
    T: DeserializeOwned + Send + 'static,
    P: Fn(&T) -> bool + Send + 'static,
{
    let state = DecodeState {
        events,
        buffer: String::new(),
        is_valid,
        last_decode_ok: false,
        done: false,
    };

    let inner = stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        loop {
            match state.events.next().await {
                Some(LlmEvent::TextDelta(delta)) => {
                    state.buffer.push_str(&delta);
                    match decode_buffer::<T>(&state.buffer) {
                        Some(value) => {
                            state.last_decode_ok = true;
                            if (state.is_valid)(&value) {
                                return Some((DecodeEvent::Object(value), state));
                            }
                        }
                        None => {
                            state.last_decode_ok = false;
                            debug!(buffered = state.buffer.len(), "Dropping undecodable chunk");
                        }
                    }
                }
                Some(LlmEvent::ReasoningDelta(reasoning)) => {
                    return Some((DecodeEvent::Reasoning(reasoning), state));
                }
                Some(LlmEvent::Error(message)) => {
                    state.done = true;
                    return Some((DecodeEvent::Error(message), state));
                }
                Some(LlmEvent::Finish { .. }) => {}
                None => {
                    state.done = true;
                    if state.last_decode_ok {
                        return None;
                    }
                    debug!(raw = %state.buffer, "Response ended without decodable JSON");
                    return Some((DecodeEvent::BadTerminalState, state));
                }
            }
        }
    });

    DecodeStream::new(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Deserialize)]
    struct Partial {
        #[serde(default)]
        items: Option<Vec<String>>,
    }

    fn text_stream(chunks: &[&str]) -> LlmEventStream {
        let mut events: Vec<LlmEvent> = chunks
            .iter()
            .map(|c| LlmEvent::TextDelta(c.to_string()))
            .collect();
        events.push(LlmEvent::Finish { usage: None });
        LlmEventStream::from_events(events)
    }

    fn has_items(value: &Partial) -> bool {
        value.items.as_ref().is_some_and(|items| !items.is_empty())
    }

    #[test]
    fn test_strip_json_markdown() {
        assert_eq!(strip_json_markdown("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_markdown("```\n[1]\n```"), "[1]");
        assert_eq!(strip_json_markdown("json {\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_markdown("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_emits_growing_partials() {
        let stream = parse_streaming_json::<Partial, _>(
            text_stream(&["{\"items\": [\"al", "pha\", \"be", "ta\"]}"]),
            has_items,
        );
        let events: Vec<_> = stream.collect().await;

        let values: Vec<Vec<String>> = events
            .into_iter()
            .map(|e| match e {
                DecodeEvent::Object(p) => p.items.unwrap(),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();

        assert_eq!(
            values,
            vec![
                vec!["al".to_string()],
                vec!["alpha".to_string(), "be".to_string()],
                vec!["alpha".to_string(), "beta".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_predicate_filters_values() {
        let stream = parse_streaming_json::<Partial, _>(
            text_stream(&["{\"items\": ", "[]", "}"]),
            has_items,
        );
        let events: Vec<_> = stream.collect().await;
        // Decodes succeed but never satisfy the predicate, and the final
        // text is valid so there is no bad terminal state.
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_fenced_response() {
        let stream = parse_streaming_json::<Partial, _>(
            text_stream(&["```json\n", "{\"items\": [\"x\"]}", "\n```"]),
            has_items,
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events.last(),
            Some(&DecodeEvent::Object(Partial {
                items: Some(vec!["x".to_string()])
            }))
        );
    }

    #[tokio::test]
    async fn test_reasoning_passes_through() {
        let stream = parse_streaming_json::<Partial, _>(
            LlmEventStream::from_events(vec![
                LlmEvent::ReasoningDelta("thinking".into()),
                LlmEvent::TextDelta("{\"items\": [\"a\"]}".into()),
            ]),
            has_items,
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events[0], DecodeEvent::Reasoning("thinking".into()));
        assert!(matches!(events[1], DecodeEvent::Object(_)));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream() {
        let stream = parse_streaming_json::<Partial, _>(
            LlmEventStream::from_events(vec![
                LlmEvent::TextDelta("{\"items\": [\"a\"".into()),
                LlmEvent::Error("connection reset".into()),
                LlmEvent::TextDelta("]}".into()),
            ]),
            has_items,
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], DecodeEvent::Error("connection reset".into()));
    }

    #[tokio::test]
    async fn test_bad_terminal_state() {
        let stream = parse_streaming_json::<Partial, _>(
            text_stream(&["Sorry, I can't ", "help with that."]),
            has_items,
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events, vec![DecodeEvent::BadTerminalState]);
    }

    #[tokio::test]
    async fn test_empty_response_is_bad_terminal_state() {
        let stream = parse_streaming_json::<Partial, _>(text_stream(&[]), has_items);
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events, vec![DecodeEvent::BadTerminalState]);
    }
}
