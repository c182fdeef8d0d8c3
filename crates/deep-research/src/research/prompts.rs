//! Prompt templates for the research pipeline
//!
//! - System: shared analyst persona, dated
//! - Query generation: topic + prior learnings → SERP queries
//! - Result processing: search contents → learnings + follow-up questions
//! - Final report: learnings → cited Markdown
//! - Feedback: topic → clarifying questions
//!
//! Structured prompts embed the JSON schema the response must follow.

use chrono::Utc;
use serde_json::json;

use super::types::Learning;

/// Prompt templates for the research pipeline
pub struct ResearchPrompts;

impl ResearchPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// System prompt shared by every call
    pub fn system() -> String {
        format!(
            r#"You are an expert researcher. Today is {date}. Follow these instructions when responding:
- You may be asked to research subjects that are after your knowledge cutoff; assume the user is right when presented with news.
- The user is a highly experienced analyst, no need to simplify it, be as detailed as possible and make sure your response is correct.
- Be highly organized.
- Suggest solutions that the user didn't think about.
- Be proactive and anticipate the user's needs.
- Treat the user as an expert in all subject matter.
- Mistakes erode trust, so be accurate and thorough.
- Provide detailed explanations, the user is comfortable with lots of detail.
- Value good arguments over authorities, the source is irrelevant.
- Consider new technologies and contrarian ideas, not just the conventional wisdom.
- You may use high levels of speculation or prediction, just flag it for the user."#,
            date = Self::current_date()
        )
    }

    /// Ask for at most `num_queries` SERP queries on `query`
    pub fn generate_queries(
        query: &str,
        num_queries: usize,
        learnings: &[Learning],
        language: &str,
        search_language: Option<&str>,
    ) -> String {
        let schema = json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "description": format!("List of SERP queries, max of {}", num_queries),
                    "items": {
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "The SERP query"
                            },
                            "researchGoal": {
                                "type": "string",
                                "description": "First talk about the goal of the research that this query is meant to accomplish, then go deeper into how to advance the research once the results are found, mention additional research directions. Be as specific as possible, especially for additional research directions."
                            }
                        },
                        "required": ["query", "researchGoal"]
                    }
                }
            },
            "required": ["queries"]
        });

        let mut sections = vec![format!(
            "Given the following prompt from the user, generate a list of SERP queries to research the topic. Return a maximum of {} queries, but feel free to return less if the original prompt is clear. Make sure each query is unique and not similar to each other: <prompt>{}</prompt>",
            num_queries, query
        )];

        if !learnings.is_empty() {
            let previous = learnings
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!(
                "Here are some learnings from previous research, use them to generate more specific queries: {}",
                previous
            ));
        }

        sections.push(Self::schema_instruction(&schema));
        sections.push(Self::language_instruction(language));
        if let Some(search_language) = search_language.filter(|s| *s != language) {
            sections.push(format!(
                "Use the language with code \"{}\" for the SERP queries. The research goals should still be written in the language with code \"{}\".",
                search_language, language
            ));
        }

        sections.join("\n\n")
    }

    /// Ask for learnings and follow-up questions from `contents`
    ///
    /// `contents` pairs each result url with its (already trimmed) content.
    pub fn process_results(
        query: &str,
        contents: &[(&str, String)],
        num_learnings: usize,
        num_follow_up_questions: usize,
        language: &str,
    ) -> String {
        let schema = json!({
            "type": "object",
            "properties": {
                "learnings": {
                    "type": "array",
                    "description": format!("List of learnings, max of {}", num_learnings),
                    "items": {
                        "type": "object",
                        "properties": {
                            "url": {
                                "type": "string",
                                "description": "The source URL from which this learning was extracted"
                            },
                            "text": {
                                "type": "string",
                                "description": "The learning itself"
                            }
                        },
                        "required": ["url", "text"]
                    }
                },
                "followUpQuestions": {
                    "type": "array",
                    "description": format!(
                        "List of follow-up questions to research the topic further, max of {}",
                        num_follow_up_questions
                    ),
                    "items": { "type": "string" }
                }
            },
            "required": ["learnings", "followUpQuestions"]
        });

        let contents = contents
            .iter()
            .map(|(url, content)| format!("<content url=\"{}\">\n{}\n</content>", url, content))
            .collect::<Vec<_>>()
            .join("\n");

        [
            format!(
                "Given the following contents from a SERP search for the query <query>{}</query>, generate a list of learnings from the contents. Return a maximum of {} learnings, but feel free to return less if the contents are clear. Make sure each learning is unique and not similar to each other. The learnings should be concise and to the point, as detailed and information dense as possible. Make sure to include any entities like people, places, companies, products, things, etc in the learnings, as well as any exact metrics, numbers, or dates. Attribute every learning to the url of the content it came from. The learnings will be used to research the topic further.",
                query, num_learnings
            ),
            format!("<contents>{}</contents>", contents),
            Self::schema_instruction(&schema),
            Self::language_instruction(language),
        ]
        .join("\n\n")
    }

    /// Ask for the final Markdown report
    pub fn final_report(prompt: &str, learnings: &[Learning], language: &str) -> String {
        let learnings = learnings
            .iter()
            .enumerate()
            .map(|(i, l)| format!("<learning index=\"{}\">\n{}\n</learning>", i + 1, l.text))
            .collect::<Vec<_>>()
            .join("\n");

        [
            format!(
                "Given the following prompt from the user, write a final report on the topic using the learnings from research. Make it as detailed as possible, aim for 3 or more pages, include ALL the learnings from research:\n\n<prompt>{}</prompt>",
                prompt
            ),
            format!(
                "Here are all the learnings from previous research:\n\n<learnings>\n{}\n</learnings>",
                learnings
            ),
            "Cite learnings with their index in square brackets, e.g. [1] or [2][5], right after the statement they support. Do not write URLs in the report body; the source list is appended separately.".to_string(),
            "Write the report in Markdown. Respond with the report only, no JSON and no code fences around it.".to_string(),
            Self::language_instruction(language),
        ]
        .join("\n\n")
    }

    /// Ask for clarifying questions about `query`
    pub fn feedback(query: &str, num_questions: usize, language: &str) -> String {
        let schema = json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "description": format!(
                        "Follow up questions to clarify the research direction, max of {}",
                        num_questions
                    ),
                    "items": { "type": "string" }
                }
            },
            "required": ["questions"]
        });

        [
            format!(
                "Given the following query from the user, ask some follow up questions to clarify the research direction. Return a maximum of {} questions, but feel free to return less if the original query is clear: <query>{}</query>",
                num_questions, query
            ),
            Self::schema_instruction(&schema),
            Self::language_instruction(language),
        ]
        .join("\n\n")
    }

    /// Query for the next recursion level below a processed node
    pub fn follow_up_query(research_goal: &str, follow_up_questions: &[String]) -> String {
        let directions: String = follow_up_questions
            .iter()
            .map(|q| format!("\n{}", q))
            .collect();
        format!(
            "Previous research goal: {}\nFollow-up research directions: {}",
            research_goal, directions
        )
        .trim()
        .to_string()
    }

    fn schema_instruction(schema: &serde_json::Value) -> String {
        format!(
            "You MUST respond in JSON matching this JSON schema: {}",
            schema
        )
    }

    fn language_instruction(language: &str) -> String {
        format!("Respond in the language with code \"{}\".", language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_dated() {
        let prompt = ResearchPrompts::system();
        assert!(prompt.contains(&ResearchPrompts::current_date()));
    }

    #[test]
    fn test_generate_queries_prompt() {
        let learnings = vec![Learning::new("https://a.com", "Tokio uses work stealing")];
        let prompt =
            ResearchPrompts::generate_queries("rust runtimes", 3, &learnings, "en", Some("de"));

        assert!(prompt.contains("<prompt>rust runtimes</prompt>"));
        assert!(prompt.contains("maximum of 3 queries"));
        assert!(prompt.contains("Tokio uses work stealing"));
        assert!(prompt.contains("researchGoal"));
        assert!(prompt.contains("code \"de\" for the SERP queries"));
    }

    #[test]
    fn test_same_search_language_is_not_repeated() {
        let prompt = ResearchPrompts::generate_queries("q", 2, &[], "en", Some("en"));
        assert!(!prompt.contains("for the SERP queries"));
        assert!(!prompt.contains("learnings from previous research"));
    }

    #[test]
    fn test_process_results_prompt_attributes_urls() {
        let contents = vec![("https://a.com", "Alpha".to_string())];
        let prompt = ResearchPrompts::process_results("q", &contents, 3, 2, "en");
        assert!(prompt.contains("<content url=\"https://a.com\">\nAlpha\n</content>"));
        assert!(prompt.contains("followUpQuestions"));
        assert!(prompt.contains("max of 2"));
    }

    #[test]
    fn test_final_report_numbers_learnings() {
        let learnings = vec![
            Learning::new("https://a.com", "first"),
            Learning::new("https://b.com", "second"),
        ];
        let prompt = ResearchPrompts::final_report("topic", &learnings, "en");
        assert!(prompt.contains("<learning index=\"2\">\nsecond\n</learning>"));
        assert!(!prompt.contains("https://a.com"));
    }

    #[test]
    fn test_follow_up_query() {
        let query = ResearchPrompts::follow_up_query(
            "Understand schedulers",
            &["How does tokio steal work?".to_string(), "What about smol?".to_string()],
        );
        assert_eq!(
            query,
            "Previous research goal: Understand schedulers\nFollow-up research directions: \nHow does tokio steal work?\nWhat about smol?"
        );
    }
}
