//! Research data types
//!
//! Every structured model output has two shapes: a complete one used by the
//! orchestrator and a `Partial*` one with all-optional fields that the
//! streaming decoder fills in chunk by chunk.

use serde::{Deserialize, Serialize};

use crate::search::SearchResultItem;

/// Placeholder some models emit instead of a real query
pub const UNDEFINED_QUERY_SENTINEL: &str = "undefined";

/// A search sub-query and the reason for running it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub research_goal: String,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            research_goal: research_goal.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_goal: Option<String>,
}

impl PartialSearchQuery {
    /// The query text, if present and non-blank
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }

    pub fn is_sentinel(&self) -> bool {
        self.query.as_deref().map(str::trim) == Some(UNDEFINED_QUERY_SENTINEL)
    }

    /// Text so far could still grow into the placeholder
    pub fn may_become_sentinel(&self) -> bool {
        self.query_text()
            .is_some_and(|q| UNDEFINED_QUERY_SENTINEL.starts_with(q.trim()))
    }

    /// Complete query, or `None` when no query text was produced
    pub fn into_complete(self) -> Option<SearchQuery> {
        let query = self.query.filter(|q| !q.trim().is_empty())?;
        Some(SearchQuery {
            query,
            research_goal: self.research_goal.unwrap_or_default(),
        })
    }
}

/// Decoded shape of a query generation response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSearchQueries {
    #[serde(default)]
    pub queries: Option<Vec<PartialSearchQuery>>,
}

/// A single source-attributed fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learning {
    pub url: String,
    /// Page title, back-filled from the search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl Learning {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            text: text.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialLearning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl PartialLearning {
    /// Complete learning; entries without a source url or text are dropped
    pub fn into_complete(self) -> Option<Learning> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        let text = self.text.filter(|t| !t.trim().is_empty())?;
        Some(Learning {
            url,
            title: self.title,
            text,
        })
    }
}

/// Learnings and follow-up questions extracted from one search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSearchResult {
    pub learnings: Vec<Learning>,
    pub follow_up_questions: Vec<String>,
}

impl ProcessedSearchResult {
    /// Fill in missing learning titles from the search results they cite
    pub fn backfill_titles(&mut self, results: &[SearchResultItem]) {
        for learning in &mut self.learnings {
            if learning.title.is_some() {
                continue;
            }
            learning.title = results
                .iter()
                .find(|item| item.url == learning.url)
                .map(|item| item.title.clone())
                .filter(|title| !title.is_empty());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialProcessedSearchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learnings: Option<Vec<PartialLearning>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<Vec<String>>,
}

impl PartialProcessedSearchResult {
    pub fn has_learnings(&self) -> bool {
        self.learnings.as_ref().is_some_and(|l| !l.is_empty())
    }

    pub fn into_complete(self) -> ProcessedSearchResult {
        ProcessedSearchResult {
            learnings: self
                .learnings
                .unwrap_or_default()
                .into_iter()
                .filter_map(PartialLearning::into_complete)
                .collect(),
            follow_up_questions: self
                .follow_up_questions
                .unwrap_or_default()
                .into_iter()
                .filter(|q| !q.trim().is_empty())
                .collect(),
        }
    }
}

/// Decoded shape of a clarifying-questions response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFeedback {
    #[serde(default)]
    pub questions: Option<Vec<String>>,
}

/// Merge learning sets, keeping the first learning seen for each url
pub fn dedupe_by_url<I>(learnings: I) -> Vec<Learning>
where
    I: IntoIterator<Item = Learning>,
{
    let mut seen = std::collections::HashSet::new();
    learnings
        .into_iter()
        .filter(|learning| seen.insert(learning.url.clone()))
        .collect()
}
