//! Tolerant decoding of truncated JSON
//!
//! A streamed model response is almost never valid JSON until the very last
//! chunk. [`fix_json`] walks the text with a small state machine, remembers
//! the last position where the prefix could still be completed, cuts
//! everything after it, and appends whatever closers the open containers
//! need. Unterminated strings are closed, partial `true`/`false`/`null`
//! literals are completed, and object keys without a value are dropped.

use serde_json::Value;

/// Outcome of [`parse_partial_json`]
#[derive(Debug, Clone, PartialEq)]
pub enum PartialJson {
    /// Blank input
    Empty,
    /// The text was valid JSON as-is
    Successful(Value),
    /// The text only decoded after repair
    Repaired(Value),
    /// Not even the repaired text decoded
    Failed,
}

impl PartialJson {
    pub fn is_ok(&self) -> bool {
        matches!(self, PartialJson::Successful(_) | PartialJson::Repaired(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            PartialJson::Successful(v) | PartialJson::Repaired(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            PartialJson::Successful(v) | PartialJson::Repaired(v) => Some(v),
            _ => None,
        }
    }
}

/// Decode `text`, repairing a truncated tail when needed
pub fn parse_partial_json(text: &str) -> PartialJson {
    if text.trim().is_empty() {
        return PartialJson::Empty;
    }

    if let Ok(value) = serde_json::from_str(text) {
        return PartialJson::Successful(value);
    }

    match serde_json::from_str(&fix_json(text)) {
        Ok(value) => PartialJson::Repaired(value),
        Err(_) => PartialJson::Failed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Root,
    Finish,
    InsideString,
    InsideStringEscape,
    InsideLiteral,
    InsideNumber,
    InsideObjectStart,
    InsideObjectKey,
    InsideObjectAfterKey,
    InsideObjectBeforeValue,
    InsideObjectAfterValue,
    InsideObjectAfterComma,
    InsideArrayStart,
    InsideArrayAfterValue,
    InsideArrayAfterComma,
}

const LITERALS: [&str; 3] = ["true", "false", "null"];

struct Fixer<'a> {
    input: &'a str,
    stack: Vec<State>,
    /// Byte offset one past the last character of the completable prefix
    valid_end: usize,
    literal_start: usize,
}

impl<'a> Fixer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            stack: vec![State::Root],
            valid_end: 0,
            literal_start: 0,
        }
    }

    fn top(&self) -> Option<State> {
        self.stack.last().copied()
    }

    fn replace_top(&mut self, state: State) {
        self.stack.pop();
        self.stack.push(state);
    }

    fn value_start(&mut self, c: char, start: usize, end: usize, after: State) {
        let inner = match c {
            '"' => State::InsideString,
            't' | 'f' | 'n' => {
                self.literal_start = start;
                State::InsideLiteral
            }
            '-' => {
                // A lone minus is not a completable number yet.
                self.replace_top(after);
                self.stack.push(State::InsideNumber);
                return;
            }
            '0'..='9' => State::InsideNumber,
            '{' => State::InsideObjectStart,
            '[' => State::InsideArrayStart,
            _ => return,
        };
        self.valid_end = end;
        self.replace_top(after);
        self.stack.push(inner);
    }

    fn after_object_value(&mut self, c: char, end: usize) {
        match c {
            ',' => self.replace_top(State::InsideObjectAfterComma),
            '}' => {
                self.valid_end = end;
                self.stack.pop();
            }
            _ => {}
        }
    }

    fn after_array_value(&mut self, c: char, end: usize) {
        match c {
            ',' => self.replace_top(State::InsideArrayAfterComma),
            ']' => {
                self.valid_end = end;
                self.stack.pop();
            }
            _ => {}
        }
    }

    /// Close a container once the scalar that ended it has been popped
    fn close_after_scalar(&mut self, c: char, end: usize) {
        match self.top() {
            Some(State::InsideObjectAfterValue) => self.after_object_value(c, end),
            Some(State::InsideArrayAfterValue) => self.after_array_value(c, end),
            _ => {}
        }
    }

    fn step(&mut self, start: usize, c: char) {
        let end = start + c.len_utf8();
        let Some(state) = self.top() else {
            return;
        };

        match state {
            State::Root => self.value_start(c, start, end, State::Finish),
            State::Finish => {}
            State::InsideObjectStart => match c {
                '"' => self.replace_top(State::InsideObjectKey),
                '}' => {
                    self.valid_end = end;
                    self.stack.pop();
                }
                _ => {}
            },
            State::InsideObjectAfterComma => {
                if c == '"' {
                    self.replace_top(State::InsideObjectKey);
                }
            }
            State::InsideObjectKey => {
                if c == '"' {
                    self.replace_top(State::InsideObjectAfterKey);
                }
            }
            State::InsideObjectAfterKey => {
                if c == ':' {
                    self.replace_top(State::InsideObjectBeforeValue);
                }
            }
            State::InsideObjectBeforeValue => {
                self.value_start(c, start, end, State::InsideObjectAfterValue)
            }
            State::InsideObjectAfterValue => self.after_object_value(c, end),
            State::InsideString => match c {
                '"' => {
                    self.stack.pop();
                    self.valid_end = end;
                }
                '\\' => self.stack.push(State::InsideStringEscape),
                _ => self.valid_end = end,
            },
            State::InsideStringEscape => {
                self.stack.pop();
                self.valid_end = end;
            }
            State::InsideArrayStart => match c {
                ']' => {
                    self.valid_end = end;
                    self.stack.pop();
                }
                _ => {
                    self.valid_end = end;
                    self.value_start(c, start, end, State::InsideArrayAfterValue);
                }
            },
            State::InsideArrayAfterValue => match c {
                ',' => self.replace_top(State::InsideArrayAfterComma),
                ']' => {
                    self.valid_end = end;
                    self.stack.pop();
                }
                _ => self.valid_end = end,
            },
            State::InsideArrayAfterComma => {
                self.value_start(c, start, end, State::InsideArrayAfterValue)
            }
            State::InsideNumber => match c {
                '0'..='9' => self.valid_end = end,
                'e' | 'E' | '-' | '+' | '.' => {}
                ',' | '}' | ']' => {
                    self.stack.pop();
                    self.close_after_scalar(c, end);
                }
                _ => {
                    self.stack.pop();
                }
            },
            State::InsideLiteral => {
                let partial = &self.input[self.literal_start..end];
                if LITERALS.iter().any(|lit| lit.starts_with(partial)) {
                    self.valid_end = end;
                } else {
                    self.stack.pop();
                    self.close_after_scalar(c, end);
                }
            }
        }
    }

    fn finish(self) -> String {
        let mut result = self.input[..self.valid_end].to_string();

        for state in self.stack.iter().rev() {
            match state {
                State::InsideString => result.push('"'),
                State::InsideObjectKey
                | State::InsideObjectAfterKey
                | State::InsideObjectAfterComma
                | State::InsideObjectStart
                | State::InsideObjectBeforeValue
                | State::InsideObjectAfterValue => result.push('}'),
                State::InsideArrayStart
                | State::InsideArrayAfterComma
                | State::InsideArrayAfterValue => result.push(']'),
                State::InsideLiteral => {
                    let partial = &self.input[self.literal_start..];
                    if let Some(lit) = LITERALS.iter().find(|lit| lit.starts_with(partial)) {
                        result.push_str(&lit[partial.len()..]);
                    }
                }
                State::Root
                | State::Finish
                | State::InsideStringEscape
                | State::InsideNumber => {}
            }
        }

        result
    }
}

/// Complete a truncated JSON document
///
/// The output is not guaranteed to be valid JSON (garbage input stays
/// garbage), but any prefix of a valid document becomes a valid document.
pub fn fix_json(input: &str) -> String {
    let mut fixer = Fixer::new(input);
    for (idx, c) in input.char_indices() {
        fixer.step(idx, c);
    }
    fixer.finish()
}
