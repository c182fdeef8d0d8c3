//! Splits `<think>…</think>` sections out of streamed text
//!
//! Several open reasoning models (DeepSeek R1, QwQ) interleave their chain of
//! thought with the answer inside `<think>` tags. Tags may be cut across
//! chunk boundaries, so the splitter holds back any suffix that could still
//! turn into a tag.

use super::provider::LlmEvent;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Stateful `<think>` tag splitter
#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    pending: String,
    in_reasoning: bool,
}

impl ThinkTagSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one text chunk, returning the events it completes
    pub fn push(&mut self, chunk: &str) -> Vec<LlmEvent> {
        self.pending.push_str(chunk);
        let mut events = Vec::new();

        loop {
            let tag = if self.in_reasoning { CLOSE_TAG } else { OPEN_TAG };
            match self.pending.find(tag) {
                Some(pos) => {
                    let before: String = self.pending.drain(..pos).collect();
                    self.pending.drain(..tag.len());
                    self.emit(before, &mut events);
                    self.in_reasoning = !self.in_reasoning;
                }
                None => {
                    let keep = partial_tag_suffix(&self.pending, tag);
                    let emit_len = self.pending.len() - keep;
                    let ready: String = self.pending.drain(..emit_len).collect();
                    self.emit(ready, &mut events);
                    break;
                }
            }
        }

        events
    }

    /// Flush whatever is still held back
    pub fn finish(&mut self) -> Vec<LlmEvent> {
        let rest = std::mem::take(&mut self.pending);
        let mut events = Vec::new();
        self.emit(rest, &mut events);
        events
    }

    fn emit(&self, text: String, events: &mut Vec<LlmEvent>) {
        if text.is_empty() {
            return;
        }
        events.push(if self.in_reasoning {
            LlmEvent::ReasoningDelta(text)
        } else {
            LlmEvent::TextDelta(text)
        });
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`
fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| text.len() >= n && text.is_char_boundary(text.len() - n) && text.ends_with(&tag[..n]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&str]) -> Vec<LlmEvent> {
        let mut splitter = ThinkTagSplitter::new();
        let mut events: Vec<LlmEvent> = chunks.iter().flat_map(|c| splitter.push(c)).collect();
        events.extend(splitter.finish());
        events
    }

    fn joined(events: &[LlmEvent]) -> (String, String) {
        let mut text = String::new();
        let mut reasoning = String::new();
        for event in events {
            match event {
                LlmEvent::TextDelta(t) => text.push_str(t),
                LlmEvent::ReasoningDelta(r) => reasoning.push_str(r),
                _ => {}
            }
        }
        (text, reasoning)
    }

    #[test]
    fn test_plain_text_passes_through() {
        let events = run(&["{\"a\":", " 1}"]);
        assert_eq!(joined(&events), ("{\"a\": 1}".to_string(), String::new()));
    }

    #[test]
    fn test_reasoning_is_split_out() {
        let events = run(&["<think>plan first</think>{\"a\":1}"]);
        assert_eq!(
            events,
            vec![
                LlmEvent::ReasoningDelta("plan first".into()),
                LlmEvent::TextDelta("{\"a\":1}".into()),
            ]
        );
    }

    #[test]
    fn test_tags_cut_across_chunks() {
        let events = run(&["<thi", "nk>step", " one</th", "ink>", "answer"]);
        assert_eq!(
            joined(&events),
            ("answer".to_string(), "step one".to_string())
        );
    }

    #[test]
    fn test_lone_angle_bracket_is_flushed() {
        let events = run(&["a <", "b"]);
        assert_eq!(joined(&events).0, "a <b");
    }

    #[test]
    fn test_unclosed_reasoning_flushes_as_reasoning() {
        let events = run(&["<think>still thinking"]);
        assert_eq!(joined(&events).1, "still thinking");
    }
}
