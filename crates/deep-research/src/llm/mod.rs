//! LLM Provider abstractions for the research engine
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   QueryGenerator / ResultProcessor /    │
//! │   ReportSynthesizer                     │
//! └─────────────────┬───────────────────────┘
//!                   │ stream_text(request, config)
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │        LLMProvider (trait)              │
//! └─────────────────┬───────────────────────┘
//!                   │ implemented by
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │         RigAgentAdapter                 │
//! │   (wraps any Rig Agent<M>)              │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Providers yield [`LlmEvent`]s: text deltas, reasoning deltas, an in-band
//! error, and a final usage record.

mod config;
mod provider;
mod reasoning;

pub use config::{LLMConfig, TokenUsage, DEFAULT_CONTEXT_SIZE};
pub use provider::{LLMProvider, LLMRequest, LlmEvent, LlmEventStream};
pub use reasoning::ThinkTagSplitter;
