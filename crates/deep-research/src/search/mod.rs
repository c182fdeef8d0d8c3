//! Web search collaborator
//!
//! The orchestrator needs a single operation from a search backend: run one
//! query and return `{url, title, content}` items. [`TavilySearch`] is the
//! bundled implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod tavily;

pub use tavily::{SearchDepth, TavilySearch, Topic};

/// One web search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub url: String,
    pub title: String,
    /// Extracted page content or snippet
    pub content: String,
}

impl SearchResultItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Per-call search options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub max_results: u32,
    /// Preferred result language, when the backend supports it
    pub language: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            language: None,
        }
    }
}

/// Typed errors for search backends
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchError {
    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout
                | SearchError::Connection(_)
                | SearchError::RateLimited
                | SearchError::ServerError(_, _)
        )
    }
}

/// Web search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResultItem>, SearchError>;

    /// Provider name for logging/debugging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_retryable() {
        assert!(SearchError::Timeout.is_retryable());
        assert!(SearchError::RateLimited.is_retryable());
        assert!(SearchError::ServerError(500, "".to_string()).is_retryable());
        assert!(SearchError::Connection("failed".to_string()).is_retryable());

        assert!(!SearchError::Unauthorized.is_retryable());
        assert!(!SearchError::BadRequest("invalid".to_string()).is_retryable());
        assert!(!SearchError::ParseError("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_search_options_serialize_camel_case() {
        let options = SearchOptions {
            max_results: 3,
            language: Some("de".into()),
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["maxResults"], 3);
        assert_eq!(json["language"], "de");
    }
}
