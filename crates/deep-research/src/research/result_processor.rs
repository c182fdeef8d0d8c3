//! Search results → learnings and follow-up questions

use std::sync::Arc;
use tracing::debug;

use super::prompts::ResearchPrompts;
use super::types::PartialProcessedSearchResult;
use crate::error::ResearchError;
use crate::llm::{LLMConfig, LLMProvider, LLMRequest};
use crate::parser::{parse_streaming_json, DecodeStream};
use crate::search::SearchResultItem;
use crate::tokenization::{trim_prompt, ApproxTokenCounter, TokenCounter};

/// Input of one result processing call
#[derive(Debug, Clone)]
pub struct ResultProcessingRequest<'a> {
    pub query: &'a str,
    pub results: &'a [SearchResultItem],
    pub num_learnings: usize,
    pub num_follow_up_questions: usize,
    pub language: &'a str,
}

/// Extracts learnings from search results with one structured LLM call
#[derive(Clone)]
pub struct ResultProcessor {
    llm: Arc<dyn LLMProvider>,
    llm_config: Option<LLMConfig>,
    token_counter: Arc<dyn TokenCounter>,
    content_token_budget: usize,
}

impl ResultProcessor {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            llm_config: None,
            token_counter: Arc::new(ApproxTokenCounter::default()),
            content_token_budget: 25_000,
        }
    }

    pub fn with_llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = counter;
        self
    }

    /// Token budget applied to each result's content
    pub fn with_content_token_budget(mut self, budget: usize) -> Self {
        self.content_token_budget = budget;
        self
    }

    /// Trimmed `(url, content)` pairs; results without content are skipped
    fn contents<'r>(&self, results: &'r [SearchResultItem]) -> Vec<(&'r str, String)> {
        results
            .iter()
            .filter(|item| !item.content.trim().is_empty())
            .map(|item| {
                (
                    item.url.as_str(),
                    trim_prompt(
                        &item.content,
                        self.content_token_budget,
                        self.token_counter.as_ref(),
                    ),
                )
            })
            .collect()
    }

    /// Stream decoded partial results, emitted once a learning exists
    pub async fn process(
        &self,
        request: &ResultProcessingRequest<'_>,
    ) -> Result<DecodeStream<PartialProcessedSearchResult>, ResearchError> {
        let contents = self.contents(request.results);
        let prompt = ResearchPrompts::process_results(
            request.query,
            &contents,
            request.num_learnings,
            request.num_follow_up_questions,
            request.language,
        );
        let llm_request = LLMRequest::new(ResearchPrompts::system(), prompt);

        debug!(
            query = request.query,
            results = request.results.len(),
            contents = contents.len(),
            "Processing search results"
        );
        let events = self
            .llm
            .stream_text(&llm_request, self.llm_config.as_ref())
            .await?;

        Ok(parse_streaming_json(
            events,
            PartialProcessedSearchResult::has_learnings,
        ))
    }
}

impl std::fmt::Debug for ResultProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultProcessor")
            .field("provider", &self.llm.name())
            .field("content_token_budget", &self.content_token_budget)
            .finish()
    }
}
