//! deep-research: recursive, breadth/depth-bounded web research for Rig
//!
//! Given a question, the engine asks a model for search queries, runs them,
//! extracts source-attributed learnings and follow-up questions from the
//! results, and recurses on the follow-ups until a depth limit is reached.
//! Learnings are merged bottom-up with one entry per source url.
//!
//! - `DeepResearcher`: the recursive orchestrator
//! - `ConcurrencyLimiter`: mutable-capacity admission gate shared by a tree
//! - `parse_streaming_json`: partial decoding of streamed structured output
//! - `NodeId`: hierarchical node identities (`"0"`, `"0-1"`, `"0-1-0"`)
//! - `RigAgentAdapter`: any Rig agent as the LLM collaborator
//! - `TavilySearch`: Tavily as the search collaborator
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rig::client::{CompletionClient, ProviderClient};
//! use rig::providers::openai::Client;
//! use deep_research::{DeepResearcher, RigAgentAdapter, ResearchRequest, TavilySearch};
//!
//! let agent = Client::from_env().agent("gpt-4.1-mini").build();
//! let llm = Arc::new(RigAgentAdapter::with_names(agent, "openai", "gpt-4.1-mini"));
//! let search = Arc::new(TavilySearch::from_env()?);
//!
//! let researcher = DeepResearcher::new(llm, search);
//! let result = researcher
//!     .research(ResearchRequest::new("Sodium-ion batteries", 4, 2), &|step| {
//!         print!("{}", step.to_sse_frame().unwrap_or_default());
//!     })
//!     .await;
//! ```

pub mod compat;
pub mod error;
pub mod limiter;
pub mod llm;
pub mod node;
pub mod parser;
pub mod research;
pub mod search;
pub mod tokenization;

// Re-exports for convenience
pub use compat::RigAgentAdapter;
pub use error::{ResearchError, INVALID_JSON_MESSAGE};
pub use limiter::{CapacityGuard, ConcurrencyLimiter, Permit};
pub use llm::{LLMConfig, LLMProvider, LLMRequest, LlmEvent, LlmEventStream, TokenUsage};
pub use node::{
    is_child_node, is_parent_node, is_root_node, search_breadth, NodeId, ROOT_NODE_ID,
};
pub use parser::{
    parse_partial_json, parse_streaming_json, strip_json_markdown, DecodeEvent, DecodeStream,
    PartialJson,
};
pub use research::{
    collect_feedback_questions, collect_report, combine_query_with_feedback, generate_feedback,
    DeepResearcher, FeedbackAnswer, Learning, ProcessedSearchResult, ProgressSink, ReportEvent,
    ReportSynthesizer, ResearchConfig, ResearchReport, ResearchRequest, ResearchResult,
    ResearchStep, RetryNode, SearchQuery,
};
pub use search::{SearchError, SearchOptions, SearchProvider, SearchResultItem, TavilySearch};
pub use tokenization::{trim_prompt, ApproxTokenCounter, TokenCounter};
#[cfg(feature = "tokenizer-tiktoken")]
pub use tokenization::TiktokenTokenCounter;
