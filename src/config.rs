//! # Configuration
//!
//! Settings come from the environment (a `.env` file is loaded first when
//! present) and can be overridden by command-line flags.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LLM_PROVIDER` | `openai` (`openai` or `ollama`) |
//! | `LLM_MODEL` | `gpt-4.1-mini` / `llama3.2` |
//! | `OPENAI_API_KEY`, `OPENAI_BASE_URL` | - |
//! | `OLLAMA_API_BASE_URL` | `http://localhost:11434` |
//! | `TAVILY_API_KEY` | required |
//! | `RESEARCH_BREADTH`, `RESEARCH_DEPTH` | `4`, `2` |
//! | `RESEARCH_LANGUAGE`, `SEARCH_LANGUAGE` | `en`, unset |
//! | `CONCURRENCY_LIMIT`, `MAX_SEARCH_RESULTS` | `2`, `5` |
//! | `CONTEXT_SIZE`, `TEMPERATURE` | `128000`, `0.7` |

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Which Rig client backs the model calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Ollama,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4.1-mini",
            Provider::Ollama => "llama3.2",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => bail!("Unknown LLM provider '{}': expected 'openai' or 'ollama'", other),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,

    /// `None` means the provider's default model
    pub model: Option<String>,

    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub ollama_host: String,
    pub tavily_api_key: Option<String>,

    /// Queries generated at the top level
    pub breadth: usize,

    /// Levels of recursion, counting the top level
    pub depth: usize,

    pub language: String,
    pub search_language: Option<String>,

    pub concurrency_limit: usize,
    pub max_search_results: u32,

    /// Model context window in tokens
    pub context_size: usize,

    pub temperature: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: None,
            openai_api_key: None,
            openai_base_url: None,
            ollama_host: "http://localhost:11434".to_string(),
            tavily_api_key: None,
            breadth: 4,
            depth: 2,
            language: "en".to_string(),
            search_language: None,
            concurrency_limit: 2,
            max_search_results: 5,
            context_size: 128_000,
            temperature: 0.7,
        }
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset and empty values keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(val) = get("LLM_PROVIDER") {
            config.provider = val.parse()?;
        }
        config.model = get("LLM_MODEL");
        config.openai_api_key = get("OPENAI_API_KEY");
        config.openai_base_url = get("OPENAI_BASE_URL");
        if let Some(val) = get("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }
        config.tavily_api_key = get("TAVILY_API_KEY");

        if let Some(val) = get("RESEARCH_BREADTH") {
            config.breadth = val
                .parse()
                .context("RESEARCH_BREADTH must be a positive integer")?;
        }
        if let Some(val) = get("RESEARCH_DEPTH") {
            config.depth = val
                .parse()
                .context("RESEARCH_DEPTH must be a positive integer")?;
        }
        if let Some(val) = get("RESEARCH_LANGUAGE") {
            config.language = val;
        }
        config.search_language = get("SEARCH_LANGUAGE");

        if let Some(val) = get("CONCURRENCY_LIMIT") {
            config.concurrency_limit = val
                .parse()
                .context("CONCURRENCY_LIMIT must be a positive integer")?;
        }
        if let Some(val) = get("MAX_SEARCH_RESULTS") {
            config.max_search_results = val
                .parse()
                .context("MAX_SEARCH_RESULTS must be a positive integer")?;
        }
        if let Some(val) = get("CONTEXT_SIZE") {
            config.context_size = val
                .parse()
                .context("CONTEXT_SIZE must be a positive integer")?;
        }
        if let Some(val) = get("TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.7)")?;
        }

        Ok(config)
    }

    /// Model name to request from the provider
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Fail fast on values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.breadth == 0 {
            bail!("Research breadth must be at least 1");
        }
        if self.depth == 0 {
            bail!("Research depth must be at least 1");
        }
        if self.concurrency_limit == 0 {
            bail!("CONCURRENCY_LIMIT must be at least 1");
        }
        if self.max_search_results == 0 {
            bail!("MAX_SEARCH_RESULTS must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }
        if self.language.trim().is_empty() {
            bail!("RESEARCH_LANGUAGE cannot be empty");
        }
        if self.tavily_api_key.is_none() {
            bail!("TAVILY_API_KEY is required for web search");
        }
        if self.provider == Provider::OpenAi && self.openai_api_key.is_none() {
            bail!("OPENAI_API_KEY is required when LLM_PROVIDER=openai");
        }
        Ok(())
    }
}
