//! Research engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ResearchError;

/// Tunables shared by every node of a research session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Maximum search/processing tasks running at once
    pub concurrency_limit: usize,

    /// Results requested per search query
    pub max_search_results: u32,

    /// Learnings requested per search query
    pub max_learnings: usize,

    /// Wall-clock limit for processing one query's search results
    #[serde(with = "humantime_serde")]
    pub result_processing_timeout: Duration,

    /// Token budget for each search result's content
    pub content_token_budget: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 2,
            max_search_results: 5,
            max_learnings: 3,
            result_processing_timeout: Duration::from_secs(60),
            content_token_budget: 25_000,
        }
    }
}

impl ResearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_max_search_results(mut self, max: u32) -> Self {
        self.max_search_results = max;
        self
    }

    pub fn with_max_learnings(mut self, max: usize) -> Self {
        self.max_learnings = max;
        self
    }

    pub fn with_result_processing_timeout(mut self, timeout: Duration) -> Self {
        self.result_processing_timeout = timeout;
        self
    }

    pub fn with_content_token_budget(mut self, budget: usize) -> Self {
        self.content_token_budget = budget;
        self
    }

    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.concurrency_limit == 0 {
            return Err(ResearchError::Config(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.max_search_results == 0 {
            return Err(ResearchError::Config(
                "max_search_results must be at least 1".to_string(),
            ));
        }
        if self.max_learnings == 0 {
            return Err(ResearchError::Config(
                "max_learnings must be at least 1".to_string(),
            ));
        }
        if self.result_processing_timeout.is_zero() {
            return Err(ResearchError::Config(
                "result_processing_timeout must be positive".to_string(),
            ));
        }
        if self.content_token_budget == 0 {
            return Err(ResearchError::Config(
                "content_token_budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
