//! Clarifying questions before a research session

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompts::ResearchPrompts;
use super::types::PartialFeedback;
use crate::error::ResearchError;
use crate::llm::{LLMConfig, LLMProvider, LLMRequest};
use crate::parser::{parse_streaming_json, DecodeEvent, DecodeStream};

/// A clarifying question and the user's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAnswer {
    pub question: String,
    pub answer: String,
}

impl FeedbackAnswer {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Stream decoded clarifying questions for `query`
pub async fn generate_feedback(
    llm: &dyn LLMProvider,
    llm_config: Option<&LLMConfig>,
    query: &str,
    num_questions: usize,
    language: &str,
) -> Result<DecodeStream<PartialFeedback>, ResearchError> {
    let request = LLMRequest::new(
        ResearchPrompts::system(),
        ResearchPrompts::feedback(query, num_questions, language),
    );
    debug!(num_questions, "Generating clarifying questions");

    let events = llm.stream_text(&request, llm_config).await?;
    Ok(parse_streaming_json(events, |value: &PartialFeedback| {
        value.questions.as_ref().is_some_and(|q| !q.is_empty())
    }))
}

/// Drain a feedback stream into at most `num_questions` questions
pub async fn collect_feedback_questions(
    mut stream: DecodeStream<PartialFeedback>,
    num_questions: usize,
) -> Result<Vec<String>, ResearchError> {
    let mut latest = PartialFeedback::default();
    while let Some(event) = stream.next().await {
        match event {
            DecodeEvent::Object(value) => latest = value,
            DecodeEvent::Reasoning(_) => {}
            DecodeEvent::Error(message) => return Err(ResearchError::Llm(message)),
            DecodeEvent::BadTerminalState => return Err(ResearchError::invalid_json()),
        }
    }

    Ok(latest
        .questions
        .unwrap_or_default()
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(num_questions)
        .collect())
}

/// Fold clarifying answers into the query handed to the orchestrator
///
/// ```text
/// Initial Query: <query>
/// Follow-up Questions and Answers:
/// Q: <question>
/// A: <answer>
/// ```
pub fn combine_query_with_feedback(initial_query: &str, feedback: &[FeedbackAnswer]) -> String {
    if feedback.is_empty() {
        return initial_query.to_string();
    }

    let answers = feedback
        .iter()
        .map(|qa| format!("Q: {}\nA: {}", qa.question, qa.answer))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Initial Query: {}\nFollow-up Questions and Answers:\n{}",
        initial_query, answers
    )
}
