//! Recursive research driver
//!
//! ```text
//! research("0")
//!   ├─ generate queries ──────────────► 0-0, 0-1, ...
//!   ├─ limiter.schedule(0-0): search → process → follow-ups?
//!   │     └─ expand() + research("0-0") ─► 0-0-0, 0-0-1, ...
//!   ├─ limiter.schedule(0-1): ...
//!   └─ join_all → dedupe_by_url → Complete
//! ```
//!
//! Branches run cooperatively inside the caller's task. A failing branch
//! reports an `error` step on its own node and contributes nothing; its
//! siblings and ancestors carry on.

use futures::future::{join_all, BoxFuture};
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::ResearchConfig;
use super::prompts::ResearchPrompts;
use super::query_generator::{QueryGenerationRequest, QueryGenerator};
use super::result_processor::{ResultProcessingRequest, ResultProcessor};
use super::step::ResearchStep;
use super::types::{
    dedupe_by_url, Learning, PartialProcessedSearchResult, PartialSearchQuery,
    ProcessedSearchResult, SearchQuery,
};
use crate::error::{ResearchError, INVALID_JSON_MESSAGE};
use crate::limiter::ConcurrencyLimiter;
use crate::llm::{LLMConfig, LLMProvider};
use crate::node::{search_breadth, NodeId};
use crate::parser::DecodeEvent;
use crate::search::{SearchOptions, SearchProvider, SearchResultItem};
use crate::tokenization::TokenCounter;

/// Receives every progress step, synchronously and in emission order
pub type ProgressSink<'a> = dyn Fn(ResearchStep) + Send + Sync + 'a;

/// A node to re-run with its stored query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryNode {
    pub node_id: NodeId,
    pub query: SearchQuery,
}

/// Arguments of one orchestrator invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub query: String,
    pub breadth: usize,
    pub max_depth: usize,
    pub language: String,
    #[serde(default)]
    pub search_language: Option<String>,
    #[serde(default)]
    pub learnings: Vec<Learning>,
    pub current_depth: usize,
    pub node_id: NodeId,
    #[serde(default)]
    pub retry_node: Option<RetryNode>,
}

impl ResearchRequest {
    /// Root request with language `"en"`
    pub fn new(query: impl Into<String>, breadth: usize, max_depth: usize) -> Self {
        Self {
            query: query.into(),
            breadth,
            max_depth,
            language: "en".to_string(),
            search_language: None,
            learnings: Vec::new(),
            current_depth: 1,
            node_id: NodeId::root(),
            retry_node: None,
        }
    }

    /// Re-run one branch of an earlier session
    ///
    /// The invocation runs on the retried node's parent, with the breadth
    /// and depth that parent had, so ids and breadth decay match the
    /// original tree.
    pub fn retry(retry: RetryNode, initial_breadth: usize, max_depth: usize) -> Self {
        let parent = retry.node_id.parent().unwrap_or_default();
        Self {
            query: retry.query.query.clone(),
            breadth: search_breadth(initial_breadth, &parent),
            max_depth,
            language: "en".to_string(),
            search_language: None,
            learnings: Vec::new(),
            current_depth: parent.depth(),
            node_id: parent,
            retry_node: Some(retry),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_search_language(mut self, language: impl Into<String>) -> Self {
        self.search_language = Some(language.into());
        self
    }

    pub fn with_learnings(mut self, learnings: Vec<Learning>) -> Self {
        self.learnings = learnings;
        self
    }

    pub fn with_current_depth(mut self, depth: usize) -> Self {
        self.current_depth = depth;
        self
    }

    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = node_id;
        self
    }

    pub fn with_retry_node(mut self, retry: RetryNode) -> Self {
        self.retry_node = Some(retry);
        self
    }
}

/// Result of every orchestrator invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub learnings: Vec<Learning>,
}

/// Recursive breadth/depth-bounded researcher
///
/// ```rust,ignore
/// let researcher = DeepResearcher::new(llm, Arc::new(TavilySearch::from_env()?));
/// let result = researcher
///     .research(ResearchRequest::new("State of Rust async in 2025", 4, 2), &|step| {
///         println!("{}", step.to_sse_frame().unwrap());
///     })
///     .await;
/// ```
#[derive(Clone)]
pub struct DeepResearcher {
    query_generator: QueryGenerator,
    result_processor: ResultProcessor,
    search: Arc<dyn SearchProvider>,
    config: ResearchConfig,
}

impl DeepResearcher {
    pub fn new(llm: Arc<dyn LLMProvider>, search: Arc<dyn SearchProvider>) -> Self {
        let config = ResearchConfig::default();
        Self {
            query_generator: QueryGenerator::new(llm.clone()),
            result_processor: ResultProcessor::new(llm)
                .with_content_token_budget(config.content_token_budget),
            search,
            config,
        }
    }

    /// Create with a validated config
    pub fn with_config(
        llm: Arc<dyn LLMProvider>,
        search: Arc<dyn SearchProvider>,
        config: ResearchConfig,
    ) -> Result<Self, ResearchError> {
        config.validate()?;
        let mut researcher = Self::new(llm, search);
        researcher.result_processor = researcher
            .result_processor
            .with_content_token_budget(config.content_token_budget);
        researcher.config = config;
        Ok(researcher)
    }

    /// Model settings for every structured call
    pub fn with_llm_config(mut self, llm_config: LLMConfig) -> Self {
        self.query_generator = self.query_generator.with_llm_config(llm_config.clone());
        self.result_processor = self.result_processor.with_llm_config(llm_config);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.result_processor = self.result_processor.with_token_counter(counter);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run one research session
    ///
    /// Never fails: problems are reported to `sink` as `error` steps. A root
    /// invocation (`node_id == "0"`) ends with exactly one `complete` step.
    pub async fn research(&self, request: ResearchRequest, sink: &ProgressSink<'_>) -> ResearchResult {
        let node_id = request.node_id.clone();
        info!(
            node_id = %node_id,
            breadth = request.breadth,
            max_depth = request.max_depth,
            retry = request.retry_node.is_some(),
            "Starting research"
        );

        let limiter = Arc::new(ConcurrencyLimiter::new(self.config.concurrency_limit));
        let learnings = self
            .research_node(Invocation::from(request), limiter, sink)
            .await;

        info!(node_id = %node_id, learnings = learnings.len(), "Research finished");
        if node_id.is_root() {
            sink(ResearchStep::Complete {
                node_id,
                learnings: learnings.clone(),
            });
        }

        ResearchResult { learnings }
    }

    fn research_node<'a>(
        &'a self,
        invocation: Invocation,
        limiter: Arc<ConcurrencyLimiter>,
        sink: &'a ProgressSink<'a>,
    ) -> BoxFuture<'a, Vec<Learning>> {
        async move {
            let children = match invocation.retry_node.clone() {
                Some(retry) if !retry.node_id.is_root() => {
                    info!(node_id = %retry.node_id, "Retrying node with stored query");
                    vec![(retry.node_id, retry.query)]
                }
                _ => self.generate_queries(&invocation, sink).await,
            };

            let branches = children
                .into_iter()
                .filter(|(_, query)| !query.query.trim().is_empty())
                .map(|(child_id, query)| {
                    self.run_branch(&invocation, child_id, query, &limiter, sink)
                });
            let contributions = join_all(branches).await;

            dedupe_by_url(contributions.into_iter().flatten())
        }
        .boxed()
    }

    /// Query phase: decode child queries and report them
    async fn generate_queries(
        &self,
        invocation: &Invocation,
        sink: &ProgressSink<'_>,
    ) -> Vec<(NodeId, SearchQuery)> {
        let node_id = &invocation.node_id;
        let request = QueryGenerationRequest {
            query: &invocation.query,
            num_queries: invocation.breadth,
            learnings: &invocation.learnings,
            language: &invocation.language,
            search_language: invocation.search_language.as_deref(),
        };

        let mut latest: Vec<PartialSearchQuery> = Vec::new();
        match self.query_generator.generate(&request).await {
            Ok(mut stream) => {
                while let Some(event) = stream.next().await {
                    match event {
                        DecodeEvent::Object(value) => {
                            latest = value.queries.unwrap_or_default();
                            latest.truncate(invocation.breadth);
                            for (index, query) in latest.iter().enumerate() {
                                if query.query_text().is_none() || query.may_become_sentinel() {
                                    continue;
                                }
                                sink(ResearchStep::GeneratingQuery {
                                    node_id: node_id.child(index),
                                    result: query.clone(),
                                });
                            }
                        }
                        DecodeEvent::Reasoning(delta) => {
                            sink(ResearchStep::GeneratingQueryReasoning {
                                node_id: node_id.clone(),
                                delta,
                            });
                        }
                        DecodeEvent::Error(message) => {
                            warn!(node_id = %node_id, error = %message, "Query generation failed");
                            sink(ResearchStep::Error {
                                node_id: node_id.clone(),
                                message,
                            });
                            break;
                        }
                        DecodeEvent::BadTerminalState => {
                            warn!(node_id = %node_id, "Query generation returned invalid JSON");
                            sink(ResearchStep::Error {
                                node_id: node_id.clone(),
                                message: INVALID_JSON_MESSAGE.to_string(),
                            });
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(node_id = %node_id, error = %err, "Query generation could not start");
                sink(ResearchStep::Error {
                    node_id: node_id.clone(),
                    message: err.to_string(),
                });
            }
        }

        sink(ResearchStep::NodeComplete {
            node_id: node_id.clone(),
            result: None,
        });

        let children: Vec<(NodeId, SearchQuery)> = latest
            .into_iter()
            .enumerate()
            .filter_map(|(index, query)| {
                query
                    .into_complete()
                    .map(|query| (node_id.child(index), query))
            })
            .collect();

        for (child_id, query) in &children {
            sink(ResearchStep::GeneratedQuery {
                node_id: child_id.clone(),
                result: query.clone(),
            });
        }

        info!(
            node_id = %node_id,
            depth = invocation.current_depth,
            queries = children.len(),
            "Generated search queries"
        );
        children
    }

    /// One child under the limiter; failures stop at this boundary
    async fn run_branch(
        &self,
        parent: &Invocation,
        child_id: NodeId,
        query: SearchQuery,
        limiter: &Arc<ConcurrencyLimiter>,
        sink: &ProgressSink<'_>,
    ) -> Vec<Learning> {
        let outcome = limiter
            .schedule(self.explore_branch(parent, &child_id, &query, limiter, sink))
            .await;

        match outcome {
            Ok(learnings) => learnings,
            Err(err) => {
                warn!(
                    node_id = %child_id,
                    query = %query.query,
                    error = %err,
                    "Research branch failed"
                );
                sink(ResearchStep::Error {
                    node_id: child_id,
                    message: err.to_string(),
                });
                Vec::new()
            }
        }
    }

    /// Search, process, and possibly recurse below `child_id`
    async fn explore_branch(
        &self,
        parent: &Invocation,
        child_id: &NodeId,
        query: &SearchQuery,
        limiter: &Arc<ConcurrencyLimiter>,
        sink: &ProgressSink<'_>,
    ) -> Result<Vec<Learning>, ResearchError> {
        sink(ResearchStep::Searching {
            node_id: child_id.clone(),
            query: query.query.clone(),
        });

        let options = SearchOptions {
            max_results: self.config.max_search_results,
            language: parent
                .search_language
                .clone()
                .or_else(|| Some(parent.language.clone())),
        };
        let results = self.search.search(&query.query, &options).await?;
        info!(node_id = %child_id, query = %query.query, results = results.len(), "Search completed");

        sink(ResearchStep::SearchComplete {
            node_id: child_id.clone(),
            results: results.clone(),
        });

        let next_breadth = parent.breadth.div_ceil(2);
        let processing = self.process_results(
            child_id,
            query,
            &results,
            next_breadth,
            &parent.language,
            sink,
        );
        let processed = match timeout(self.config.result_processing_timeout, processing).await {
            Ok(result) => result?,
            Err(_) => return Err(ResearchError::Timeout(self.config.result_processing_timeout)),
        };

        let mut learnings = parent.learnings.clone();
        learnings.extend(processed.learnings.iter().cloned());

        let next_depth = parent.current_depth + 1;
        if next_depth > parent.max_depth || processed.follow_up_questions.is_empty() {
            return Ok(dedupe_by_url(learnings));
        }

        debug!(
            node_id = %child_id,
            breadth = next_breadth,
            depth = next_depth,
            "Researching deeper"
        );
        let _capacity = limiter.expand();
        let deeper = self
            .research_node(
                Invocation {
                    query: ResearchPrompts::follow_up_query(
                        &query.research_goal,
                        &processed.follow_up_questions,
                    ),
                    breadth: next_breadth,
                    max_depth: parent.max_depth,
                    current_depth: next_depth,
                    node_id: child_id.clone(),
                    learnings: learnings.clone(),
                    language: parent.language.clone(),
                    search_language: parent.search_language.clone(),
                    retry_node: None,
                },
                Arc::clone(limiter),
                sink,
            )
            .await;

        Ok(dedupe_by_url(learnings.into_iter().chain(deeper)))
    }

    /// Decode learnings for one child and report them
    async fn process_results(
        &self,
        node_id: &NodeId,
        query: &SearchQuery,
        results: &[SearchResultItem],
        num_follow_up_questions: usize,
        language: &str,
        sink: &ProgressSink<'_>,
    ) -> Result<ProcessedSearchResult, ResearchError> {
        let request = ResultProcessingRequest {
            query: &query.query,
            results,
            num_learnings: self.config.max_learnings,
            num_follow_up_questions,
            language,
        };
        let mut stream = self.result_processor.process(&request).await?;

        let mut latest: Option<PartialProcessedSearchResult> = None;
        while let Some(event) = stream.next().await {
            match event {
                DecodeEvent::Object(partial) => {
                    sink(ResearchStep::ProcessingSearchResult {
                        node_id: node_id.clone(),
                        query: query.query.clone(),
                        result: partial.clone(),
                    });
                    latest = Some(partial);
                }
                DecodeEvent::Reasoning(delta) => {
                    sink(ResearchStep::ProcessingSearchResultReasoning {
                        node_id: node_id.clone(),
                        delta,
                    });
                }
                DecodeEvent::Error(message) => return Err(ResearchError::Llm(message)),
                DecodeEvent::BadTerminalState => return Err(ResearchError::invalid_json()),
            }
        }

        let mut processed = latest
            .map(PartialProcessedSearchResult::into_complete)
            .unwrap_or_default();
        processed.learnings.truncate(self.config.max_learnings);
        processed
            .follow_up_questions
            .truncate(num_follow_up_questions);
        processed.backfill_titles(results);

        sink(ResearchStep::NodeComplete {
            node_id: node_id.clone(),
            result: Some(processed.clone()),
        });
        Ok(processed)
    }
}

impl std::fmt::Debug for DeepResearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepResearcher")
            .field("search", &self.search.name())
            .field("config", &self.config)
            .finish()
    }
}

/// State of one orchestrator invocation
#[derive(Debug, Clone)]
struct Invocation {
    query: String,
    breadth: usize,
    max_depth: usize,
    current_depth: usize,
    node_id: NodeId,
    /// Snapshot of everything learned on the path to this node
    learnings: Vec<Learning>,
    language: String,
    search_language: Option<String>,
    retry_node: Option<RetryNode>,
}

impl From<ResearchRequest> for Invocation {
    fn from(request: ResearchRequest) -> Self {
        Self {
            query: request.query,
            breadth: request.breadth,
            max_depth: request.max_depth,
            current_depth: request.current_depth,
            node_id: request.node_id,
            learnings: request.learnings,
            language: request.language,
            search_language: request.search_language,
            retry_node: request.retry_node,
        }
    }
}
