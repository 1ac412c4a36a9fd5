//! Progress events emitted while a turn is being processed.
//!
//! The streaming pipeline produces these in order on a channel; the
//! transport turns each one into a `data: <json>\n\n` frame.
//!
//! - `status`: free-form progress line
//! - `recipe_search`: retrieval finished with `count` hits
//! - `tool_use`: a knowledge-base tool is about to run
//! - `tool_complete`: that tool finished
//! - `response`: the final answer (same as the synchronous result)
//! - `error`: the turn failed; replaces `response`
//! - `end`: terminal frame after a successful `response`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Status { message: String },

    RecipeSearch { count: usize, message: String },

    ToolUse { tool: String, message: String },

    ToolComplete { tool: String, message: String },

    Response { content: String, thread_id: String },

    Error { message: String },

    End,
}

impl ProgressEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status { message: message.into() }
    }

    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::RecipeSearch { .. } => "recipe_search",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolComplete { .. } => "tool_complete",
            Self::Response { .. } => "response",
            Self::Error { .. } => "error",
            Self::End => "end",
        }
    }

    /// Whether the stream closes after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::End)
    }

    /// JSON payload carried by one `data:` frame of the event stream.
    pub fn to_json(&self) -> String {
        // Serializing a tagged enum of strings and integers cannot fail.
        serde_json::to_string(self)
            .unwrap_or_else(|_| String::from(r#"{"type":"error","message":"unserializable event"}"#))
    }
}
