//! # Deep Research Agent
//!
//! Recursive web research from the command line: the model proposes search
//! queries, Tavily runs them, learnings and follow-up questions are
//! extracted, and the follow-ups are researched again until the depth limit.
//! The session ends with a Markdown report citing its sources.
//!
//! ## Quick Start
//! ```bash
//! export OPENAI_API_KEY=... TAVILY_API_KEY=...
//! cargo run -- --breadth 3 --depth 2 "State of sodium-ion batteries"
//! ```

mod agent;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::agent::{ResearchAgent, RunOptions};
use crate::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "deep-research-agent",
    version,
    about = "Recursive web research with a cited Markdown report",
    long_about = r#"
Deep Research Agent

Researches a topic as a tree: each level asks the model for search queries,
searches the web, extracts learnings, and follows up on open questions with
half the breadth of the level above.

EXAMPLES:
  # Default breadth and depth from the environment
  deep-research-agent "Impact of RISC-V on embedded tooling"

  # Wider and deeper, answering clarifying questions first
  deep-research-agent --clarify -b 6 -d 3 "European heat pump market"

  # Stream progress as server-sent events for another process
  deep-research-agent --sse "Post-quantum TLS adoption"

  # Local model through Ollama
  deep-research-agent --provider ollama --model qwen3 "WebGPU compute"
"#
)]
struct Args {
    /// The research topic or question
    #[arg(value_name = "QUERY")]
    query: String,

    /// Queries generated at the top level
    #[arg(short = 'b', long = "breadth")]
    breadth: Option<usize>,

    /// Levels of recursion, counting the top level
    #[arg(short = 'd', long = "depth")]
    depth: Option<usize>,

    /// Language code for all model output
    #[arg(short = 'l', long = "language")]
    language: Option<String>,

    /// Language code for the search queries, if different
    #[arg(long = "search-language")]
    search_language: Option<String>,

    /// `openai` or `ollama`
    #[arg(long = "provider")]
    provider: Option<String>,

    /// Model name (overrides LLM_MODEL)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Ask clarifying questions before researching
    #[arg(long = "clarify", default_value = "false")]
    clarify: bool,

    /// Write progress to stdout as SSE frames and skip the report
    #[arg(long = "sse", default_value = "false")]
    sse: bool,

    /// Stop after research; do not write a report
    #[arg(long = "no-report", default_value = "false")]
    no_report: bool,

    /// Print the report as JSON
    #[arg(long = "json", default_value = "false")]
    json: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(provider) = &self.provider {
            config.provider = provider.parse()?;
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(breadth) = self.breadth {
            config.breadth = breadth;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(language) = &self.search_language {
            config.search_language = Some(language.clone());
        }
        Ok(())
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            sse: self.sse,
            report: !self.no_report,
            clarify: self.clarify,
            json: self.json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    args.apply(&mut config)?;
    config.validate()?;

    info!(
        provider = %config.provider,
        model = %config.model_name(),
        "Configuration loaded"
    );

    let agent = ResearchAgent::new(config)?;
    match agent.run(&args.query, args.run_options()).await {
        Ok(_) => {
            info!("Research session finished");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Research session failed");
            Err(e)
        }
    }
}

/// Structured logs on stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
