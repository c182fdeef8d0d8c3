//! Final report synthesis
//!
//! One streamed prose call over the deduplicated learnings. Citations are
//! numbered `[n]` in learning order, so the source list can be rendered
//! from [`ResearchReport::learnings`] without parsing the Markdown.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::prompts::ResearchPrompts;
use super::types::Learning;
use crate::error::ResearchError;
use crate::llm::{LLMConfig, LLMProvider, LLMRequest, LlmEvent, DEFAULT_CONTEXT_SIZE};
use crate::tokenization::{ApproxTokenCounter, TokenCounter};

/// Tokens kept free for the report when `max_tokens` is unset
pub const REPORT_OUTPUT_RESERVE: usize = 8_192;

/// One item of a streamed report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Text(String),
    Reasoning(String),
}

pub type ReportStream = BoxStream<'static, Result<ReportEvent, ResearchError>>;

/// A finished report and the learnings its citations refer to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub markdown: String,
    pub learnings: Vec<Learning>,
}

impl ResearchReport {
    /// Numbered source list matching the `[n]` citations
    pub fn sources_markdown(&self) -> String {
        let sources = self
            .learnings
            .iter()
            .enumerate()
            .map(|(i, learning)| match &learning.title {
                Some(title) => format!("{}. [{}]({})", i + 1, title, learning.url),
                None => format!("{}. <{}>", i + 1, learning.url),
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("## Sources\n\n{}", sources)
    }
}

/// Writes the final report with one LLM call
#[derive(Clone)]
pub struct ReportSynthesizer {
    llm: Arc<dyn LLMProvider>,
    llm_config: Option<LLMConfig>,
}

impl ReportSynthesizer {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            llm_config: None,
        }
    }

    pub fn with_llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    /// Stream the report for `prompt` from `learnings`
    pub async fn stream(
        &self,
        prompt: &str,
        learnings: &[Learning],
        language: &str,
    ) -> Result<ReportStream, ResearchError> {
        let counter = ApproxTokenCounter::default();
        let frame = format!(
            "{}\n\n{}",
            ResearchPrompts::system(),
            ResearchPrompts::final_report(prompt, &[], language)
        );
        let budget = learning_budget(self.llm_config.as_ref(), &frame, &counter);
        let included = learnings_within_budget(learnings, budget, &counter);
        let request = LLMRequest::new(
            ResearchPrompts::system(),
            ResearchPrompts::final_report(prompt, &learnings[..included], language),
        );
        info!(
            learnings = learnings.len(),
            included,
            budget,
            "Writing final report"
        );

        let events = self
            .llm
            .stream_text(&request, self.llm_config.as_ref())
            .await?;

        Ok(events
            .filter_map(|event| {
                futures::future::ready(match event {
                    LlmEvent::TextDelta(text) => Some(Ok(ReportEvent::Text(text))),
                    LlmEvent::ReasoningDelta(text) => Some(Ok(ReportEvent::Reasoning(text))),
                    LlmEvent::Error(message) => Some(Err(ResearchError::Llm(message))),
                    LlmEvent::Finish { usage } => {
                        debug!(?usage, "Report stream finished");
                        None
                    }
                })
            })
            .boxed())
    }

    /// Stream the report, forwarding each event, and return the result
    pub async fn write<F>(
        &self,
        prompt: &str,
        learnings: Vec<Learning>,
        language: &str,
        on_event: F,
    ) -> Result<ResearchReport, ResearchError>
    where
        F: FnMut(&ReportEvent),
    {
        let stream = self.stream(prompt, &learnings, language).await?;
        collect_report(stream, learnings, on_event).await
    }
}

impl std::fmt::Debug for ReportSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSynthesizer")
            .field("provider", &self.llm.name())
            .finish()
    }
}

/// Tokens left for learnings after the prompt frame and the answer
fn learning_budget(config: Option<&LLMConfig>, frame: &str, counter: &dyn TokenCounter) -> usize {
    let (context_size, output) = match config {
        Some(config) => (
            config.context_size,
            config
                .max_tokens
                .map_or(REPORT_OUTPUT_RESERVE, |tokens| usize::try_from(tokens).unwrap_or(usize::MAX)),
        ),
        None => (DEFAULT_CONTEXT_SIZE, REPORT_OUTPUT_RESERVE),
    };
    context_size
        .saturating_sub(counter.count_text(frame))
        .saturating_sub(output)
}

/// How many leading learnings fit in `budget` tokens
///
/// Whole learnings are dropped from the end so citation numbers stay
/// aligned with the source list.
fn learnings_within_budget(learnings: &[Learning], budget: usize, counter: &dyn TokenCounter) -> usize {
    let mut used = 0;
    learnings
        .iter()
        .take_while(|learning| {
            used += counter.count_text(&learning.text);
            used <= budget
        })
        .count()
}

/// Gather report text; the first error aborts
pub async fn collect_report<F>(
    mut stream: ReportStream,
    learnings: Vec<Learning>,
    mut on_event: F,
) -> Result<ResearchReport, ResearchError>
where
    F: FnMut(&ReportEvent),
{
    let mut markdown = String::new();
    while let Some(event) = stream.next().await {
        let event = event?;
        on_event(&event);
        if let ReportEvent::Text(text) = &event {
            markdown.push_str(text);
        }
    }

    Ok(ResearchReport {
        markdown: markdown.trim().to_string(),
        learnings,
    })
}
