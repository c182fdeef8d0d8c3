//! LLM configuration types
//!
//! Per-call generation settings and token accounting for LLM providers.

use serde::{Deserialize, Serialize};

/// Default context window assumed for the model, in tokens
pub const DEFAULT_CONTEXT_SIZE: usize = 128_000;

/// Token usage reported at the end of a streamed completion.
///
/// # Example
///
/// ```
/// use deep_research::llm::TokenUsage;
///
/// let mut total = TokenUsage::default();
/// total += TokenUsage::new(120, 40);
/// total += TokenUsage::new(80, 10);
/// assert_eq!(total.total_tokens, 250);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }

    /// Convert rig-core's usage record
    pub fn from_rig_usage(usage: &rig::completion::Usage) -> Self {
        Self::new(usage.input_tokens, usage.output_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Generation settings passed with each LLM call
///
/// `None` fields fall back to whatever the provider was built with.
///
/// ```
/// use deep_research::llm::LLMConfig;
///
/// let config = LLMConfig::new("gpt-4.1-mini")
///     .with_temperature(0.3)
///     .with_context_size(64_000);
///
/// assert_eq!(config.context_size, 64_000);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Model identifier
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    /// Context window used when trimming prompts
    #[serde(default = "default_context_size")]
    pub context_size: usize,
}

fn default_context_size() -> usize {
    DEFAULT_CONTEXT_SIZE
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: None,
            max_tokens: None,
            context_size: DEFAULT_CONTEXT_SIZE,
        }
    }
}

impl LLMConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_context_size(mut self, tokens: usize) -> Self {
        self.context_size = tokens;
        self
    }
}
