//! Adapter for using Rig Agents as the research engine's LLMProvider
//!
//! `RigAgentAdapter` wraps any Rig `Agent<M>` so the research engine can run
//! on every provider Rig supports (OpenAI-compatible endpoints, Ollama,
//! Anthropic, ...).
//!
//! # Usage
//!
//! ```rust,ignore
//! use rig::providers::openai::Client;
//! use rig::client::{CompletionClient, ProviderClient};
//! use deep_research::compat::RigAgentAdapter;
//!
//! let client = Client::from_env();
//! let agent = client.agent("gpt-4.1-mini").build();
//! let provider = RigAgentAdapter::with_names(agent, "openai", "gpt-4.1-mini");
//! ```
//!
//! # Limitations
//!
//! - Text and reasoning are forwarded. Reasoning arrives either as
//!   provider-native reasoning items or as `<think>` tags in the text.
//! - Tool calls are ignored; the research prompts never offer tools.

use async_trait::async_trait;
use std::sync::Arc;

use futures::StreamExt;

use rig::agent::Agent;
use rig::completion::{Completion, CompletionModel, GetTokenUsage, Message as RigMessage};
use rig::streaming::StreamedAssistantContent;
use tracing::debug;

use crate::error::ResearchError;
use crate::llm::{LLMConfig, LLMProvider, LLMRequest, LlmEvent, LlmEventStream, ThinkTagSplitter, TokenUsage};

/// Adapter that wraps a Rig `Agent<M>` to implement `LLMProvider`.
pub struct RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    agent: Arc<Agent<M>>,
    provider_name: String,
    model_name: String,
}

impl<M> RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    pub fn new(agent: Agent<M>) -> Self {
        Self {
            agent: Arc::new(agent),
            provider_name: "rig".to_string(),
            model_name: "rig-agent".to_string(),
        }
    }

    /// Create adapter with custom provider/model names for logging.
    pub fn with_names(
        agent: Agent<M>,
        provider_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            provider_name: provider_name.into(),
            model_name: model_name.into(),
        }
    }

    pub fn agent(&self) -> &Agent<M> {
        &self.agent
    }
}

#[async_trait]
impl<M> LLMProvider for RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn stream_text(
        &self,
        request: &LLMRequest,
        config: Option<&LLMConfig>,
    ) -> Result<LlmEventStream, ResearchError> {
        let mut builder = self
            .agent
            .completion(RigMessage::user(request.prompt.clone()), Vec::new())
            .await
            .map_err(|e| ResearchError::llm(format!("Rig agent error: {}", e)))?;

        if let Some(preamble) = merge_preamble(self.agent.preamble.as_deref(), &request.system_prompt) {
            builder = builder.preamble(preamble);
        }

        if let Some(cfg) = config {
            if let Some(temperature) = cfg.temperature {
                builder = builder.temperature(temperature);
            }
            if let Some(max_tokens) = cfg.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }
        }

        debug!(provider = %self.provider_name, model = %self.model_name, "Starting streamed completion");

        let stream = builder
            .stream()
            .await
            .map_err(|e| ResearchError::llm(format!("Rig agent error: {}", e)))?;

        // `None` marks the end of the upstream so held-back text is flushed.
        let mapped = stream
            .map(Some)
            .chain(futures::stream::once(async { None }))
            .scan(ThinkTagSplitter::new(), |splitter, item| {
                let events = map_item(splitter, item);
                futures::future::ready(Some(futures::stream::iter(events)))
            })
            .flatten();

        Ok(LlmEventStream::new(mapped))
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.model_name
    }
}

/// Translate one upstream item; `None` is the end of the upstream
fn map_item<R, E>(
    splitter: &mut ThinkTagSplitter,
    item: Option<Result<StreamedAssistantContent<R>, E>>,
) -> Vec<LlmEvent>
where
    R: Clone + Unpin + GetTokenUsage,
    E: std::fmt::Display,
{
    match item {
        Some(Ok(StreamedAssistantContent::Text(text))) => splitter.push(&text.text),
        Some(Ok(StreamedAssistantContent::Reasoning(reasoning))) => {
            let delta = reasoning.reasoning.concat();
            if delta.is_empty() {
                Vec::new()
            } else {
                vec![LlmEvent::ReasoningDelta(delta)]
            }
        }
        Some(Ok(StreamedAssistantContent::Final(response))) => {
            let usage = response
                .token_usage()
                .map(|usage| TokenUsage::from_rig_usage(&usage))
                .filter(|usage| !usage.is_empty());
            let mut events = splitter.finish();
            events.push(LlmEvent::Finish { usage });
            events
        }
        // Tool call items
        Some(Ok(_)) => Vec::new(),
        Some(Err(err)) => vec![LlmEvent::Error(format!("Rig agent error: {}", err))],
        None => splitter.finish(),
    }
}

/// Combine the agent's own preamble with the per-call system prompt
fn merge_preamble(agent_preamble: Option<&str>, system_prompt: &str) -> Option<String> {
    let system_prompt = system_prompt.trim();
    match (agent_preamble, system_prompt.is_empty()) {
        (Some(agent), false) => Some(format!("{}\n\n{}", agent, system_prompt)),
        (None, false) => Some(system_prompt.to_string()),
        (_, true) => None,
    }
}

impl<M> std::fmt::Debug for RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigAgentAdapter")
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .finish()
    }
}
