//! # Agent Module
//!
//! Wires configuration to the research engine: builds the Rig-backed model
//! collaborator and the Tavily search collaborator, runs a session, and
//! renders progress and the final report on the terminal.

use anyhow::{Context, Result};
use deep_research::{
    collect_feedback_questions, collect_report, combine_query_with_feedback, generate_feedback, DeepResearcher,
    FeedbackAnswer, LLMConfig, LLMProvider, ReportEvent, ReportSynthesizer, ResearchConfig,
    ResearchReport, ResearchRequest, ResearchStep, RigAgentAdapter, TavilySearch,
};
use rig::client::{CompletionClient, ProviderClient};
use rig::providers::{ollama, openai};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::{Config, Provider};

/// Clarifying questions asked with `--clarify`
const FEEDBACK_QUESTIONS: usize = 3;

/// How a session is presented
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Emit progress as SSE frames on stdout; no report is written
    pub sse: bool,
    pub report: bool,
    pub clarify: bool,
    /// Print the finished report as JSON instead of streaming Markdown
    pub json: bool,
}

/// Research session driver for the command line
pub struct ResearchAgent {
    config: Config,
    llm: Arc<dyn LLMProvider>,
    llm_config: LLMConfig,
    researcher: DeepResearcher,
}

impl ResearchAgent {
    pub fn new(config: Config) -> Result<Self> {
        let llm = build_llm(&config);
        let llm_config = LLMConfig::new(config.model_name())
            .with_temperature(config.temperature)
            .with_context_size(config.context_size);

        let api_key = config
            .tavily_api_key
            .clone()
            .context("TAVILY_API_KEY is required for web search")?;
        let search = Arc::new(TavilySearch::new(api_key));

        let research_config = ResearchConfig::default()
            .with_concurrency_limit(config.concurrency_limit)
            .with_max_search_results(config.max_search_results);
        let researcher = DeepResearcher::with_config(llm.clone(), search, research_config)?
            .with_llm_config(llm_config.clone());

        Ok(Self {
            config,
            llm,
            llm_config,
            researcher,
        })
    }

    /// Run one session for `query`; returns the report unless it was skipped
    pub async fn run(&self, query: &str, options: RunOptions) -> Result<Option<ResearchReport>> {
        let query = if options.clarify && !options.sse {
            self.clarify(query).await?
        } else {
            query.to_string()
        };

        let mut request =
            ResearchRequest::new(query.clone(), self.config.breadth, self.config.depth)
                .with_language(self.config.language.clone());
        if let Some(search_language) = &self.config.search_language {
            request = request.with_search_language(search_language.clone());
        }

        info!(
            provider = %self.config.provider,
            model = %self.config.model_name(),
            breadth = self.config.breadth,
            depth = self.config.depth,
            "Starting research session"
        );

        let result = if options.sse {
            self.researcher.research(request, &print_sse_frame).await
        } else {
            self.researcher.research(request, &print_progress).await
        };

        if options.sse || !options.report {
            return Ok(None);
        }

        let synthesizer =
            ReportSynthesizer::new(self.llm.clone()).with_llm_config(self.llm_config.clone());
        let stream = synthesizer
            .stream(&query, &result.learnings, &self.config.language)
            .await?;

        let report = collect_report(stream, result.learnings, |event| match event {
            ReportEvent::Text(text) if !options.json => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            ReportEvent::Text(_) => {}
            ReportEvent::Reasoning(text) => debug!(reasoning = %text, "Report reasoning"),
        })
        .await?;

        if options.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("\n\n{}", report.sources_markdown());
        }
        Ok(Some(report))
    }

    /// Ask clarifying questions on stdin and fold the answers into the query
    async fn clarify(&self, query: &str) -> Result<String> {
        let stream = generate_feedback(
            self.llm.as_ref(),
            Some(&self.llm_config),
            query,
            FEEDBACK_QUESTIONS,
            &self.config.language,
        )
        .await?;
        let questions = collect_feedback_questions(stream, FEEDBACK_QUESTIONS).await?;
        if questions.is_empty() {
            return Ok(query.to_string());
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            eprintln!("\n{}", question);
            eprint!("> ");
            let _ = std::io::stderr().flush();
            let answer = lines.next_line().await?.unwrap_or_default();
            answers.push(FeedbackAnswer::new(question, answer.trim()));
        }

        Ok(combine_query_with_feedback(query, &answers))
    }
}

/// Build the model collaborator for the configured provider
///
/// Rig's clients read their endpoints from the environment, so the
/// configured values are exported before the client is created.
fn build_llm(config: &Config) -> Arc<dyn LLMProvider> {
    let model = config.model_name().to_string();
    match config.provider {
        Provider::OpenAi => {
            if let Some(key) = &config.openai_api_key {
                std::env::set_var("OPENAI_API_KEY", key);
            }
            if let Some(url) = &config.openai_base_url {
                std::env::set_var("OPENAI_BASE_URL", url);
            }
            let agent = openai::Client::from_env().agent(&model).build();
            Arc::new(RigAgentAdapter::with_names(agent, "openai", model))
        }
        Provider::Ollama => {
            std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
            let agent = ollama::Client::from_env().agent(&model).build();
            Arc::new(RigAgentAdapter::with_names(agent, "ollama", model))
        }
    }
}

fn print_sse_frame(step: ResearchStep) {
    match step.to_sse_frame() {
        Ok(frame) => {
            print!("{}", frame);
            let _ = std::io::stdout().flush();
        }
        Err(err) => warn!(error = %err, kind = step.kind(), "Could not serialize step"),
    }
}

fn print_progress(step: ResearchStep) {
    if let Some(line) = render_step(&step) {
        eprintln!("{}", line);
    }
}

/// One human-readable line for the steps worth showing
pub fn render_step(step: &ResearchStep) -> Option<String> {
    match step {
        ResearchStep::GeneratedQuery { node_id, result } => Some(format!(
            "[{}] query: {}",
            node_id, result.query
        )),
        ResearchStep::Searching { node_id, query } => {
            Some(format!("[{}] searching: {}", node_id, query))
        }
        ResearchStep::SearchComplete { node_id, results } => {
            Some(format!("[{}] {} results", node_id, results.len()))
        }
        ResearchStep::NodeComplete {
            node_id,
            result: Some(result),
        } => Some(format!(
            "[{}] {} learnings, {} follow-up questions",
            node_id,
            result.learnings.len(),
            result.follow_up_questions.len()
        )),
        ResearchStep::Error { node_id, message } => {
            Some(format!("[{}] error: {}", node_id, message))
        }
        ResearchStep::Complete { learnings, .. } => Some(format!(
            "Research complete: {} learnings",
            learnings.len()
        )),
        _ => None,
    }
}
