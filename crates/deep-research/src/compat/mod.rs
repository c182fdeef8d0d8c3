//! Compatibility layer between Rig and the research engine
//!
//! - [`RigAgentAdapter`]: Wraps a Rig `Agent<M>` to implement [`crate::llm::LLMProvider`]

pub mod rig_agent_adapter;

pub use rig_agent_adapter::RigAgentAdapter;
