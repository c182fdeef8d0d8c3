// src/error.rs
//! Error types for the research engine
//!
//! Every failure inside a research tree is converted into a node-scoped
//! progress event by the orchestrator; these types exist so that the
//! collaborators can report *what* went wrong before that happens.

use thiserror::Error;

use crate::search::SearchError;

/// Top-level research error
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// The model never produced a decodable response
    #[error("{0}")]
    Decode(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResearchError {
    pub fn llm(msg: impl std::fmt::Display) -> Self {
        Self::Llm(msg.to_string())
    }

    /// Decode failure with the fixed user-facing message
    pub fn invalid_json() -> Self {
        Self::Decode(INVALID_JSON_MESSAGE.to_string())
    }
}

/// Message reported when a model response never became valid JSON
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON response from the model";
