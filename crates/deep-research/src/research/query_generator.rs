//! Topic → SERP queries

use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

use super::prompts::ResearchPrompts;
use super::types::{Learning, PartialSearchQueries, PartialSearchQuery};
use crate::error::ResearchError;
use crate::llm::{LLMConfig, LLMProvider, LLMRequest};
use crate::parser::{parse_streaming_json, DecodeEvent, DecodeStream};

/// Input of one query generation call
#[derive(Debug, Clone)]
pub struct QueryGenerationRequest<'a> {
    pub query: &'a str,
    pub num_queries: usize,
    pub learnings: &'a [Learning],
    pub language: &'a str,
    pub search_language: Option<&'a str>,
}

/// Generates search queries with one structured LLM call
#[derive(Clone)]
pub struct QueryGenerator {
    llm: Arc<dyn LLMProvider>,
    llm_config: Option<LLMConfig>,
}

impl QueryGenerator {
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

    /// Stream decoded query lists
    ///
    /// Values are emitted once the first query has text. Queries equal to
    /// the `"undefined"` placeholder are blanked in place, so the positions
    /// of the queries after them never shift.
    pub async fn generate(
        &self,
        request: &QueryGenerationRequest<'_>,
    ) -> Result<DecodeStream<PartialSearchQueries>, ResearchError> {
        let prompt = ResearchPrompts::generate_queries(
            request.query,
            request.num_queries,
            request.learnings,
            request.language,
            request.search_language,
        );
        let llm_request = LLMRequest::new(ResearchPrompts::system(), prompt);

        debug!(
            provider = self.llm.name(),
            num_queries = request.num_queries,
            "Generating search queries"
        );
        let events = self
            .llm
            .stream_text(&llm_request, self.llm_config.as_ref())
            .await?;

        let decoded = parse_streaming_json(events, |value: &PartialSearchQueries| {
            value
                .queries
                .as_ref()
                .and_then(|queries| queries.first())
                .and_then(|first| first.query_text())
                .is_some()
        });

        Ok(DecodeStream::new(decoded.map(|event| match event {
            DecodeEvent::Object(mut value) => {
                for query in value.queries.iter_mut().flatten() {
                    if query.is_sentinel() {
                        *query = PartialSearchQuery::default();
                    }
                }
                DecodeEvent::Object(value)
            }
            other => other,
        })))
    }
}

impl std::fmt::Debug for QueryGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryGenerator")
            .field("provider", &self.llm.name())
            .field("llm_config", &self.llm_config)
            .finish()
    }
}
