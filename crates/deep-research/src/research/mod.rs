//! Deep research pipeline
//!
//! # Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ DeepResearcher::research(request, sink)                      │
//! │                                                              │
//! │  QueryGenerator ──► SERP queries (node-0-i)                  │
//! │        │                                                     │
//! │        ▼  per query, under the ConcurrencyLimiter            │
//! │  SearchProvider ──► ResultProcessor ──► learnings            │
//! │        │                              + follow-up questions  │
//! │        ▼  depth left and follow-ups present                  │
//! │  recurse with breadth / 2                                    │
//! │                                                              │
//! │  fan-in: dedupe_by_url ──► ResearchResult                    │
//! └──────────────────────────────────────────────────────────────┘
//!                 │
//!                 ▼
//!        ReportSynthesizer ──► Markdown with [n] citations
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use deep_research::research::{DeepResearcher, ReportSynthesizer, ResearchRequest};
//!
//! let researcher = DeepResearcher::new(llm.clone(), search);
//! let result = researcher
//!     .research(ResearchRequest::new("Solid-state batteries", 4, 2), &|step| {
//!         tracing::info!(kind = step.kind(), node = %step.node_id());
//!     })
//!     .await;
//!
//! let report = ReportSynthesizer::new(llm)
//!     .write("Solid-state batteries", result.learnings, "en", |_| {})
//!     .await?;
//! ```
//!
//! # Module Structure
//!
//! - `orchestrator` - Recursive fan-out/fan-in driver
//! - `query_generator` / `result_processor` - The two structured LLM calls
//! - `report` - Final report synthesis
//! - `feedback` - Clarifying questions before a session
//! - `step` - Progress events and SSE framing
//! - `prompts` - Prompt templates
//! - `types` - Queries, learnings, processed results
//! - `config` - Engine tunables

pub mod config;
pub mod feedback;
pub mod orchestrator;
pub mod prompts;
pub mod query_generator;
pub mod report;
pub mod result_processor;
pub mod step;
pub mod types;

pub use config::ResearchConfig;
pub use feedback::{
    collect_feedback_questions, combine_query_with_feedback, generate_feedback, FeedbackAnswer,
};
pub use orchestrator::{DeepResearcher, ProgressSink, ResearchRequest, ResearchResult, RetryNode};
pub use prompts::ResearchPrompts;
pub use query_generator::{QueryGenerationRequest, QueryGenerator};
pub use report::{collect_report, ReportEvent, ReportStream, ReportSynthesizer, ResearchReport};
pub use result_processor::{ResultProcessingRequest, ResultProcessor};
pub use step::ResearchStep;
pub use types::{
    dedupe_by_url, Learning, PartialFeedback, PartialLearning, PartialProcessedSearchResult,
    PartialSearchQueries, PartialSearchQuery, ProcessedSearchResult, SearchQuery,
    UNDEFINED_QUERY_SENTINEL,
};
