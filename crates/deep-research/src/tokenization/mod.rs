//! Token counting and prompt trimming
//!
//! Search result contents are trimmed to a token budget before they are
//! handed to the model. Counting is pluggable: [`ApproxTokenCounter`] is
//! dependency free, `TiktokenTokenCounter` is available behind the
//! `tokenizer-tiktoken` feature.

use tracing::debug;

/// Average characters per token used by the approximate counter
pub const DEFAULT_CHARS_PER_TOKEN: f32 = 4.0;

/// Never trim below this many characters
pub const MIN_CHUNK_SIZE: usize = 140;

/// Characters per token assumed when estimating how much text to cut
const CUT_CHARS_PER_TOKEN: usize = 3;

/// Boundaries tried in order when shortening text
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

pub trait TokenCounter: Send + Sync {
    fn count_text(&self, text: &str) -> usize;
}

#[derive(Debug, Clone)]
pub struct ApproxTokenCounter {
    pub chars_per_token: f32,
}

impl ApproxTokenCounter {
    pub fn new(chars_per_token: f32) -> Self {
        Self { chars_per_token }
    }
}

impl Default for ApproxTokenCounter {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl TokenCounter for ApproxTokenCounter {
    fn count_text(&self, text: &str) -> usize {
        (text.chars().count() as f32 / self.chars_per_token).ceil() as usize
    }
}

#[cfg(feature = "tokenizer-tiktoken")]
#[derive(Debug, Clone)]
pub struct TiktokenTokenCounter {
    encoder: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tokenizer-tiktoken")]
impl TiktokenTokenCounter {
    pub fn new(encoder: tiktoken_rs::CoreBPE) -> Self {
        Self { encoder }
    }

    pub fn cl100k_base() -> Result<Self, crate::error::ResearchError> {
        let encoder = tiktoken_rs::cl100k_base()
            .map_err(|e| crate::error::ResearchError::Config(format!("tiktoken: {}", e)))?;
        Ok(Self { encoder })
    }
}

#[cfg(feature = "tokenizer-tiktoken")]
impl TokenCounter for TiktokenTokenCounter {
    fn count_text(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }
}

/// Shorten `text` until it fits in `context_size` tokens
///
/// Each round estimates how many characters to drop, then cuts at the last
/// paragraph, line, sentence or word boundary inside the kept prefix. The
/// result is never shorter than [`MIN_CHUNK_SIZE`] characters unless the
/// input already was.
pub fn trim_prompt(text: &str, context_size: usize, counter: &dyn TokenCounter) -> String {
    let mut current = text;

    loop {
        if current.is_empty() {
            return String::new();
        }

        let tokens = counter.count_text(current);
        if tokens <= context_size {
            return current.to_string();
        }

        let char_len = current.chars().count();
        let overflow = tokens - context_size;
        let chunk_size = char_len.saturating_sub(overflow * CUT_CHARS_PER_TOKEN);
        if chunk_size < MIN_CHUNK_SIZE {
            return prefix_chars(current, MIN_CHUNK_SIZE).to_string();
        }

        let hard_cut = prefix_chars(current, chunk_size);
        let trimmed = cut_at_boundary(hard_cut);
        debug!(
            tokens,
            context_size,
            from = current.len(),
            to = trimmed.len(),
            "Trimming prompt"
        );

        // A cut that made no progress falls back to the hard cut.
        current = if trimmed.len() >= current.len() {
            hard_cut
        } else {
            trimmed
        };
    }
}

/// The first `n` characters of `text`
fn prefix_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Shorten to the last separator, coarsest first
fn cut_at_boundary(text: &str) -> &str {
    SEPARATORS
        .iter()
        .filter_map(|sep| text.rfind(sep).filter(|&idx| idx > 0).map(|idx| &text[..idx]))
        .next()
        .map(str::trim_end)
        .filter(|cut| !cut.is_empty())
        .unwrap_or(text)
}
