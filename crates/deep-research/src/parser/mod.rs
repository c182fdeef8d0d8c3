//! Streaming structured-output parser
//!
//! ```text
//! LlmEventStream ──► buffer += delta ──► strip fences ──► parse_partial_json
//!                                                             │
//!                                 predicate(value)? ◄─────────┘
//!                                       │ yes
//!                                       ▼
//!                              DecodeEvent::Object(value)
//! ```

pub mod partial_json;
pub mod streaming;

pub use partial_json::{fix_json, parse_partial_json, PartialJson};
pub use streaming::{parse_streaming_json, strip_json_markdown, DecodeEvent, DecodeStream};
