//! Progress events
//!
//! [`ResearchStep`] is the only thing the orchestrator reports while it
//! runs. Every variant carries the id of the node it belongs to and
//! serializes as a flat JSON object tagged by `type`:
//!
//! ```text
//! {"type":"searching","nodeId":"0-1","query":"rust async runtimes"}
//! ```

use serde::{Deserialize, Serialize};

use super::types::{
    Learning, PartialProcessedSearchResult, PartialSearchQuery, ProcessedSearchResult,
    SearchQuery,
};
use crate::node::NodeId;
use crate::search::SearchResultItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ResearchStep {
    /// A child query is being generated
    GeneratingQuery {
        node_id: NodeId,
        result: PartialSearchQuery,
    },
    /// Reasoning while generating queries, on the parent node
    GeneratingQueryReasoning { node_id: NodeId, delta: String },
    /// Final query for a child node
    GeneratedQuery {
        node_id: NodeId,
        result: SearchQuery,
    },
    Searching { node_id: NodeId, query: String },
    SearchComplete {
        node_id: NodeId,
        results: Vec<SearchResultItem>,
    },
    /// Partial learnings for a child node
    ProcessingSearchResult {
        node_id: NodeId,
        query: String,
        result: PartialProcessedSearchResult,
    },
    ProcessingSearchResultReasoning { node_id: NodeId, delta: String },
    /// A node finished; child nodes carry their processed result
    NodeComplete {
        node_id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ProcessedSearchResult>,
    },
    Error { node_id: NodeId, message: String },
    /// The whole session finished
    Complete {
        node_id: NodeId,
        learnings: Vec<Learning>,
    },
}

impl ResearchStep {
    pub fn node_id(&self) -> &NodeId {
        match self {
            ResearchStep::GeneratingQuery { node_id, .. }
            | ResearchStep::GeneratingQueryReasoning { node_id, .. }
            | ResearchStep::GeneratedQuery { node_id, .. }
            | ResearchStep::Searching { node_id, .. }
            | ResearchStep::SearchComplete { node_id, .. }
            | ResearchStep::ProcessingSearchResult { node_id, .. }
            | ResearchStep::ProcessingSearchResultReasoning { node_id, .. }
            | ResearchStep::NodeComplete { node_id, .. }
            | ResearchStep::Error { node_id, .. }
            | ResearchStep::Complete { node_id, .. } => node_id,
        }
    }

    /// The `type` tag this step serializes with
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchStep::GeneratingQuery { .. } => "generating_query",
            ResearchStep::GeneratingQueryReasoning { .. } => "generating_query_reasoning",
            ResearchStep::GeneratedQuery { .. } => "generated_query",
            ResearchStep::Searching { .. } => "searching",
            ResearchStep::SearchComplete { .. } => "search_complete",
            ResearchStep::ProcessingSearchResult { .. } => "processing_search_result",
            ResearchStep::ProcessingSearchResultReasoning { .. } => {
                "processing_search_result_reasoning"
            }
            ResearchStep::NodeComplete { .. } => "node_complete",
            ResearchStep::Error { .. } => "error",
            ResearchStep::Complete { .. } => "complete",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ResearchStep::Complete { .. })
    }

    /// Encode as one server-sent event frame: `data: <JSON>\n\n`
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_and_field_names() {
        let step = ResearchStep::Searching {
            node_id: NodeId::from("0-1"),
            query: "rust".into(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "searching");
        assert_eq!(json["nodeId"], "0-1");
        assert_eq!(json["query"], "rust");
        assert_eq!(step.kind(), "searching");
    }

    #[test]
    fn test_sse_frame_is_exact() {
        let step = ResearchStep::Error {
            node_id: NodeId::root(),
            message: "boom".into(),
        };
        assert_eq!(
            step.to_sse_frame().unwrap(),
            "data: {\"type\":\"error\",\"nodeId\":\"0\",\"message\":\"boom\"}\n\n"
        );
    }

    #[test]
    fn test_node_complete_without_result() {
        let step = ResearchStep::NodeComplete {
            node_id: NodeId::root(),
            result: None,
        };
        assert_eq!(
            serde_json::to_string(&step).unwrap(),
            r#"{"type":"node_complete","nodeId":"0"}"#
        );
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let steps = vec![
            ResearchStep::GeneratingQueryReasoning {
                node_id: NodeId::root(),
                delta: "x".into(),
            },
            ResearchStep::ProcessingSearchResultReasoning {
                node_id: NodeId::root(),
                delta: "x".into(),
            },
            ResearchStep::Complete {
                node_id: NodeId::root(),
                learnings: vec![],
            },
        ];
        for step in steps {
            let json = serde_json::to_value(&step).unwrap();
            assert_eq!(json["type"], step.kind());
        }
    }

    #[test]
    fn test_round_trip_from_client_json() {
        let step: ResearchStep = serde_json::from_str(
            r#"{"type":"generated_query","nodeId":"0-0","result":{"query":"q","researchGoal":"g"}}"#,
        )
        .unwrap();
        assert_eq!(step.node_id().as_str(), "0-0");
    }
}
