//! LLM Provider trait definition
//!
//! The research engine only ever needs one thing from a language model: a
//! streamed completion for a (system prompt, prompt) pair. Structured output
//! is requested through the prompt and decoded on our side by
//! [`crate::parser`], so providers stay schema-agnostic.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::config::{LLMConfig, TokenUsage};
use crate::error::ResearchError;

/// One event of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// Answer text (for structured calls, a slice of JSON)
    TextDelta(String),
    /// Model reasoning, shown to the user but never decoded
    ReasoningDelta(String),
    /// The provider failed mid-stream; no more events follow
    Error(String),
    /// End of the completion
    Finish { usage: Option<TokenUsage> },
}

/// Prompt pair sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LLMRequest {
    pub system_prompt: String,
    pub prompt: String,
}

impl LLMRequest {
    pub fn new(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
        }
    }
}

/// Streaming response wrapper
pub struct LlmEventStream {
    inner: Pin<Box<dyn Stream<Item = LlmEvent> + Send>>,
}

impl LlmEventStream {
    /// Create a new stream from any compatible async stream
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = LlmEvent> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Stream a fixed list of events
    ///
    /// Useful for providers without native streaming and in tests.
    pub fn from_events(events: Vec<LlmEvent>) -> Self {
        Self::new(futures::stream::iter(events))
    }

    /// Stream a complete text response as a single delta
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_events(vec![
            LlmEvent::TextDelta(text.into()),
            LlmEvent::Finish { usage: None },
        ])
    }
}

impl Stream for LlmEventStream {
    type Item = LlmEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for LlmEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmEventStream").finish_non_exhaustive()
    }
}

/// Core LLM Provider trait
///
/// Implementations bridge to a concrete model API. Errors returned from
/// `stream_text` mean the call could not start; failures after the first
/// event are delivered in-band as [`LlmEvent::Error`].
///
/// ```rust,ignore
/// use deep_research::llm::{LLMProvider, LLMRequest, LlmEvent, LlmEventStream};
///
/// struct Echo;
///
/// #[async_trait]
/// impl LLMProvider for Echo {
///     async fn stream_text(
///         &self,
///         request: &LLMRequest,
///         _config: Option<&LLMConfig>,
///     ) -> Result<LlmEventStream, ResearchError> {
///         Ok(LlmEventStream::from_text(request.prompt.clone()))
///     }
///
///     fn name(&self) -> &str { "echo" }
///     fn default_model(&self) -> &str { "echo-1" }
/// }
/// ```
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start a streamed completion
    async fn stream_text(
        &self,
        request: &LLMRequest,
        config: Option<&LLMConfig>,
    ) -> Result<LlmEventStream, ResearchError>;

    /// Provider name for logging/debugging
    fn name(&self) -> &str;

    /// Default model identifier for this provider
    fn default_model(&self) -> &str;
}
