//! End-to-end orchestrator behavior against scripted collaborators

use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deep_research::{
    DeepResearcher, LLMConfig, LLMProvider, LLMRequest, LlmEvent, LlmEventStream, NodeId,
    ResearchConfig, ResearchError, ResearchRequest, ResearchStep, RetryNode, SearchError,
    SearchOptions, SearchProvider, SearchQuery, SearchResultItem, INVALID_JSON_MESSAGE,
};

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// What the scripted model does with one kind of prompt
#[derive(Clone, Copy)]
enum Reply {
    Json,
    Garbage,
    Hang,
}

/// Answers query-generation and result-processing prompts with chunked JSON
struct ScriptedLlm {
    queries: Reply,
    processing: Reply,
    follow_ups: bool,
    extra_queries: Vec<String>,
    sentinel_at: Option<usize>,
    counter: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new() -> Self {
        Self {
            queries: Reply::Json,
            processing: Reply::Json,
            follow_ups: true,
            extra_queries: Vec::new(),
            sentinel_at: None,
            counter: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn query_prompts(&self) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains("generate a list of SERP queries"))
            .count()
    }

    fn reply(&self, prompt: &str) -> Option<String> {
        if prompt.contains("generate a list of SERP queries") {
            let max = between(prompt, "Return a maximum of ", " queries")
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(1);
            match self.queries {
                Reply::Garbage => return Some("Sorry, I cannot help with that.".into()),
                Reply::Hang => return None,
                Reply::Json => {}
            }
            let mut queries: Vec<serde_json::Value> = self
                .extra_queries
                .iter()
                .map(|q| serde_json::json!({"query": q, "researchGoal": "placeholder"}))
                .collect();
            for _ in 0..max {
                let k = self.counter.fetch_add(1, Ordering::SeqCst);
                queries.push(serde_json::json!({
                    "query": format!("query-{}", k),
                    "researchGoal": format!("goal-{}", k),
                }));
            }
            if let Some(at) = self.sentinel_at {
                queries.insert(
                    at.min(queries.len()),
                    serde_json::json!({"query": "undefined", "researchGoal": "placeholder"}),
                );
            }
            return Some(serde_json::json!({ "queries": queries }).to_string());
        }

        let query = between(prompt, "<query>", "</query>").unwrap_or_default();
        match self.processing {
            Reply::Garbage => Some("no json here".into()),
            Reply::Hang => None,
            Reply::Json => {
                let follow_ups: Vec<String> = if self.follow_ups {
                    vec![format!("more about {}", query)]
                } else {
                    Vec::new()
                };
                Some(
                    serde_json::json!({
                        "learnings": [
                            {"url": format!("https://example.com/{}", query), "text": format!("fact from {}", query)},
                            {"url": "https://example.com/shared", "text": "shared fact"},
                        ],
                        "followUpQuestions": follow_ups,
                    })
                    .to_string(),
                )
            }
        }
    }
}

fn between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let to = haystack[from..].find(end)? + from;
    Some(&haystack[from..to])
}

fn chunked(text: &str) -> Vec<LlmEvent> {
    let chars: Vec<char> = text.chars().collect();
    let mut events: Vec<LlmEvent> = chars
        .chunks(9)
        .map(|chunk| LlmEvent::TextDelta(chunk.iter().collect()))
        .collect();
    events.push(LlmEvent::Finish { usage: None });
    events
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn stream_text(
        &self,
        request: &LLMRequest,
        _config: Option<&LLMConfig>,
    ) -> Result<LlmEventStream, ResearchError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(match self.reply(&request.prompt) {
            Some(text) => LlmEventStream::from_events(chunked(&text)),
            None => LlmEventStream::new(stream::pending()),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }
}

/// One result per query, url derived from the query text
struct MockSearch {
    fail_on: Option<String>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockSearch {
    fn new() -> Self {
        Self {
            fail_on: None,
            delay: None,
            queries: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    fn failing_on(query: &str) -> Self {
        Self {
            fail_on: Some(query.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchResultItem>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.as_deref() == Some(query) {
            return Err(SearchError::RateLimited);
        }
        Ok(vec![SearchResultItem::new(
            format!("https://example.com/{}", query),
            format!("Page for {}", query),
            format!("Everything there is to know about {}.", query),
        )])
    }

    fn name(&self) -> &str {
        "mock"
    }
}

async fn run(
    llm: ScriptedLlm,
    search: MockSearch,
    config: ResearchConfig,
    request: ResearchRequest,
) -> (Vec<ResearchStep>, Vec<deep_research::Learning>, Arc<ScriptedLlm>, Arc<MockSearch>) {
    let llm = Arc::new(llm);
    let search = Arc::new(search);
    let researcher = DeepResearcher::with_config(llm.clone(), search.clone(), config).unwrap();

    let steps = Mutex::new(Vec::new());
    let result = researcher
        .research(request, &|step| steps.lock().unwrap().push(step))
        .await;
    (steps.into_inner().unwrap(), result.learnings, llm, search)
}

fn ids_of<'a>(steps: &'a [ResearchStep], kind: &str) -> Vec<&'a str> {
    steps
        .iter()
        .filter(|s| s.kind() == kind)
        .map(|s| s.node_id().as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// Tree shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_single_level_tree() {
    let (steps, learnings, _, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("solid-state batteries", 2, 1),
    )
    .await;

    let mut generated = ids_of(&steps, "generated_query");
    generated.sort();
    assert_eq!(generated, vec!["0-0", "0-1"]);

    assert!(steps
        .iter()
        .all(|s| s.node_id().depth() <= 2), "no grandchildren at max depth 1");

    let completes: Vec<_> = steps.iter().filter(|s| s.is_complete()).collect();
    assert_eq!(completes.len(), 1);
    assert!(steps.last().unwrap().is_complete());
    assert_eq!(steps.last().unwrap().node_id().as_str(), "0");

    // Two own urls plus the shared one
    assert_eq!(learnings.len(), 3);
    if let ResearchStep::Complete { learnings: reported, .. } = steps.last().unwrap() {
        assert_eq!(reported, &learnings);
    }
}

#[tokio::test]
async fn test_node_complete_for_parent_precedes_children() {
    let (steps, _, _, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 2, 1),
    )
    .await;

    let root_done = steps
        .iter()
        .position(|s| s.kind() == "node_complete" && s.node_id().is_root())
        .unwrap();
    let first_search = steps.iter().position(|s| s.kind() == "searching").unwrap();
    assert!(root_done < first_search);

    for id in ["0-0", "0-1"] {
        let searching = steps
            .iter()
            .position(|s| s.kind() == "searching" && s.node_id().as_str() == id)
            .unwrap();
        let complete = steps
            .iter()
            .position(|s| s.kind() == "search_complete" && s.node_id().as_str() == id)
            .unwrap();
        let done = steps
            .iter()
            .position(|s| s.kind() == "node_complete" && s.node_id().as_str() == id)
            .unwrap();
        assert!(searching < complete && complete < done);
    }
}

#[tokio::test]
async fn test_recursion_halves_breadth() {
    let (steps, learnings, llm, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 4, 2),
    )
    .await;

    let mut generated = ids_of(&steps, "generated_query");
    generated.sort();
    assert_eq!(
        generated,
        vec!["0-0", "0-0-0", "0-0-1", "0-1", "0-1-0", "0-1-1", "0-2", "0-2-0", "0-2-1", "0-3", "0-3-0", "0-3-1"]
    );
    assert!(steps.iter().all(|s| s.node_id().depth() <= 3));

    // Root plus one query-generation call per recursing child
    assert_eq!(llm.query_prompts(), 5);

    let urls: HashSet<_> = learnings.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls.len(), learnings.len(), "learnings are unique by url");
    assert_eq!(learnings.len(), 4 + 8 + 1);
}

#[tokio::test]
async fn test_follow_up_query_carries_research_goal() {
    let (_, _, llm, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 1, 2),
    )
    .await;

    let prompts = llm.prompts.lock().unwrap();
    let follow_up = prompts
        .iter()
        .filter(|p| p.contains("generate a list of SERP queries"))
        .nth(1)
        .unwrap();
    assert!(follow_up.contains(
        "<prompt>Previous research goal: goal-0\nFollow-up research directions: \nmore about query-0</prompt>"
    ));
    assert!(follow_up.contains("fact from query-0"), "parent learnings are passed down");
}

#[tokio::test]
async fn test_no_recursion_without_follow_ups() {
    let mut llm = ScriptedLlm::new();
    llm.follow_ups = false;
    let (steps, _, llm, _) = run(
        llm,
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 2, 3),
    )
    .await;

    assert_eq!(llm.query_prompts(), 1);
    assert!(steps.iter().all(|s| s.node_id().depth() <= 2));
}

#[tokio::test]
async fn test_no_recursion_at_max_depth() {
    let request = ResearchRequest::new("topic", 2, 2)
        .with_current_depth(2)
        .with_node_id(NodeId::from("0-1"));
    let (steps, _, llm, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        request,
    )
    .await;

    assert_eq!(llm.query_prompts(), 1);
    let mut generated = ids_of(&steps, "generated_query");
    generated.sort();
    assert_eq!(generated, vec!["0-1-0", "0-1-1"]);
    assert!(
        steps.iter().all(|s| !s.is_complete()),
        "only root invocations end with complete"
    );
}

#[tokio::test]
async fn test_deep_tree_with_single_slot_finishes() {
    let config = ResearchConfig::default().with_concurrency_limit(1);
    let (steps, learnings, _, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        config,
        ResearchRequest::new("topic", 2, 3),
    )
    .await;

    assert!(ids_of(&steps, "generated_query").contains(&"0-1-0-0"));
    assert!(steps.last().unwrap().is_complete());
    assert!(!learnings.is_empty());
}

#[tokio::test]
async fn test_searches_in_flight_stay_within_limit() {
    for limit in [1, 2] {
        let config = ResearchConfig::default().with_concurrency_limit(limit);
        let (steps, _, _, search) = run(
            ScriptedLlm::new(),
            MockSearch::slow(Duration::from_millis(5)),
            config,
            ResearchRequest::new("topic", 4, 3),
        )
        .await;

        assert!(steps.last().unwrap().is_complete());
        // 4 + 4 * 2 + 8 * 1 searches across three levels
        assert_eq!(search.queries.lock().unwrap().len(), 20);
        let peak = search.peak.load(Ordering::SeqCst);
        assert!((1..=limit).contains(&peak), "limit {} saw {} searches at once", limit, peak);
        assert_eq!(search.in_flight.load(Ordering::SeqCst), 0);
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_search_failure_is_isolated_to_its_node() {
    let (steps, learnings, _, _) = run(
        ScriptedLlm::new(),
        MockSearch::failing_on("query-1"),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 2, 1),
    )
    .await;

    let failed = steps
        .iter()
        .find_map(|s| match s {
            ResearchStep::Error { node_id, message } if node_id.as_str() == "0-1" => {
                Some(message.clone())
            }
            _ => None,
        })
        .expect("error step for the failing node");
    assert!(failed.contains("Rate limited"));

    assert!(ids_of(&steps, "node_complete").contains(&"0-0"));
    assert!(!ids_of(&steps, "node_complete").contains(&"0-1"));
    assert!(steps.last().unwrap().is_complete());
    assert!(learnings.iter().any(|l| l.url == "https://example.com/query-0"));
    assert!(learnings.iter().all(|l| l.url != "https://example.com/query-1"));
}

#[tokio::test]
async fn test_invalid_query_json_reports_error_and_completes() {
    let mut llm = ScriptedLlm::new();
    llm.queries = Reply::Garbage;
    let (steps, learnings, _, search) = run(
        llm,
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 2, 1),
    )
    .await;

    let error = steps.iter().find(|s| s.kind() == "error").unwrap();
    assert!(error.node_id().is_root());
    if let ResearchStep::Error { message, .. } = error {
        assert_eq!(message, INVALID_JSON_MESSAGE);
    }
    assert!(search.queries.lock().unwrap().is_empty());
    assert!(learnings.is_empty());
    assert!(steps.last().unwrap().is_complete());
}

#[tokio::test]
async fn test_invalid_processing_json_fails_branch() {
    let mut llm = ScriptedLlm::new();
    llm.processing = Reply::Garbage;
    let (steps, learnings, _, _) = run(
        llm,
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 2, 2),
    )
    .await;

    let mut errored = ids_of(&steps, "error");
    errored.sort();
    assert_eq!(errored, vec!["0-0", "0-1"]);
    assert!(steps.iter().all(|s| s.node_id().depth() <= 2));
    assert!(learnings.is_empty());
}

#[tokio::test]
async fn test_processing_timeout_becomes_error_step() {
    let mut llm = ScriptedLlm::new();
    llm.processing = Reply::Hang;
    let config = ResearchConfig::default().with_result_processing_timeout(Duration::from_millis(50));
    let (steps, learnings, _, _) = run(
        llm,
        MockSearch::new(),
        config,
        ResearchRequest::new("topic", 1, 1),
    )
    .await;

    let message = steps
        .iter()
        .find_map(|s| match s {
            ResearchStep::Error { node_id, message } if node_id.as_str() == "0-0" => {
                Some(message.clone())
            }
            _ => None,
        })
        .unwrap();
    assert!(message.contains("Timed out"));
    assert!(learnings.is_empty());
    assert!(steps.last().unwrap().is_complete());
}

#[tokio::test]
async fn test_sentinel_queries_never_run() {
    let mut llm = ScriptedLlm::new();
    llm.extra_queries = vec!["undefined".to_string()];
    let (steps, _, _, search) = run(
        llm,
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 3, 1),
    )
    .await;

    for step in &steps {
        match step {
            ResearchStep::GeneratedQuery { result, .. } => assert_ne!(result.query, "undefined"),
            ResearchStep::Searching { query, .. } => assert_ne!(query, "undefined"),
            _ => {}
        }
    }
    assert!(!search.queries.lock().unwrap().iter().any(|q| q == "undefined"));
}

#[tokio::test]
async fn test_placeholder_keeps_sibling_ids_stable() {
    let mut llm = ScriptedLlm::new();
    llm.sentinel_at = Some(1);
    let (steps, _, _, _) = run(
        llm,
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 3, 1),
    )
    .await;

    let finals: HashMap<String, String> = steps
        .iter()
        .filter_map(|s| match s {
            ResearchStep::GeneratedQuery { node_id, result } => {
                Some((node_id.to_string(), result.query.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(finals.get("0-0").map(String::as_str), Some("query-0"));
    assert_eq!(finals.get("0-2").map(String::as_str), Some("query-1"));
    assert!(!finals.contains_key("0-1"));

    // Every partial shown for a node grows into that node's final query
    for step in &steps {
        if let ResearchStep::GeneratingQuery { node_id, result } = step {
            let partial = result.query.as_deref().unwrap_or_default();
            let last = finals
                .get(node_id.as_str())
                .unwrap_or_else(|| panic!("partial for unused node {}", node_id));
            assert!(last.starts_with(partial), "{} showed {:?}", node_id, partial);
        }
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_retry_reruns_stored_query_without_generation() {
    let retry = RetryNode {
        node_id: NodeId::from("0-1"),
        query: SearchQuery::new("stored query", "stored goal"),
    };
    let (steps, learnings, llm, search) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::retry(retry, 2, 1),
    )
    .await;

    assert_eq!(llm.query_prompts(), 0);
    assert_eq!(*search.queries.lock().unwrap(), vec!["stored query".to_string()]);
    assert_eq!(ids_of(&steps, "searching"), vec!["0-1"]);
    assert!(learnings
        .iter()
        .any(|l| l.url == "https://example.com/stored query"));
    assert!(steps.last().unwrap().is_complete());
}

#[tokio::test]
async fn test_retry_recurses_under_retried_node() {
    let retry = RetryNode {
        node_id: NodeId::from("0-1"),
        query: SearchQuery::new("stored query", "stored goal"),
    };
    let (steps, _, llm, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::retry(retry, 4, 2),
    )
    .await;

    assert_eq!(llm.query_prompts(), 1);
    let mut generated = ids_of(&steps, "generated_query");
    generated.sort();
    assert_eq!(generated, vec!["0-1-0", "0-1-1"]);
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_every_step_serializes_as_sse_frame() {
    let (steps, _, _, _) = run(
        ScriptedLlm::new(),
        MockSearch::new(),
        ResearchConfig::default(),
        ResearchRequest::new("topic", 2, 1),
    )
    .await;

    for step in &steps {
        let frame = step.to_sse_frame().unwrap();
        assert!(frame.starts_with("data: {\"type\":\""));
        assert!(frame.ends_with("\n\n"));
        let json: serde_json::Value =
            serde_json::from_str(frame.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["type"], step.kind());
        assert_eq!(json["nodeId"], step.node_id().as_str());
    }
}
