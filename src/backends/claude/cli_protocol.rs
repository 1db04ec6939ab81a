//! Claude CLI JSON Protocol Types
//!
//! Serde types for the NDJSON stream `claude -p --output-format stream-json
//! --include-partial-messages` writes to stdout, plus the user message it
//! accepts on stdin with `--input-format stream-json`.
//!
//! ## Protocol Overview
//!
//! - `system` events announce the session (`init`).
//! - `stream_event` wraps raw API streaming events. Text and tool arguments
//!   arrive as fragments: a `content_block_start` opens a block, any number of
//!   `content_block_delta`s fill it, and `content_block_stop` closes it.
//! - `assistant` / `user` carry whole messages. They repeat what the
//!   fragments already delivered and are ignored.
//! - `result` ends the turn with status, usage and the final text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Main Event Enum
// ============================================================================

/// Top-level event types emitted by the Claude CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliEvent {
    /// System events for initialization.
    System(SystemEvent),

    /// A raw API streaming event.
    StreamEvent(StreamEventEnvelope),

    /// Result event indicating the turn has completed.
    Result(ResultEvent),

    /// Catch-all for `assistant`, `user` and event types added in future CLI
    /// versions.
    #[serde(other)]
    Unknown,
}

/// System event for CLI initialization.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemEvent {
    /// Subtype of the system event (e.g., "init")
    pub subtype: String,

    /// Session ID assigned by the CLI
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

// ============================================================================
// Partial-message stream events
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StreamEventEnvelope {
    pub event: StreamEvent,
}

/// API streaming events relayed by the CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ContentBlockStart {
        #[serde(default)]
        index: u32,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: u32,
    },
    /// `message_start`, `message_delta`, `message_stop`, `ping` and friends.
    #[serde(other)]
    Unknown,
}

/// The opening shape of a content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    /// A tool invocation whose arguments follow as `input_json_delta`s.
    ToolUse { id: String, name: String },
    /// Text, thinking and anything newer.
    #[serde(other)]
    Unknown,
}

/// A fragment of a content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    /// Thinking and signature deltas.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Result Events
// ============================================================================

/// Result event indicating turn completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultEvent {
    /// "success", or an error subtype such as "error_max_turns"
    pub subtype: String,

    #[serde(default)]
    pub is_error: bool,

    /// Total duration in milliseconds
    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// Number of API turns
    #[serde(default)]
    pub num_turns: Option<u32>,

    /// Final assistant text, or the error text on failure
    #[serde(default)]
    pub result: Option<String>,

    #[serde(default)]
    pub usage: Option<UsageInfo>,

    /// Error details reported by newer CLI versions
    #[serde(default)]
    pub errors: Vec<Value>,

    #[serde(default)]
    pub session_id: Option<String>,
}

impl ResultEvent {
    pub fn is_success(&self) -> bool {
        self.subtype == "success" && !self.is_error
    }

    /// Error strings for a failed turn: the `errors` array if present, else
    /// the result text, else a message naming the subtype.
    pub fn error_messages(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .errors
            .iter()
            .filter_map(|error| match error {
                Value::String(text) => Some(text.clone()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| Some(error.to_string())),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|text| !text.trim().is_empty())
            .collect();
        if !listed.is_empty() {
            return listed;
        }

        match self.result.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => vec![text.to_string()],
            _ => vec![format!("Claude run ended with {}", self.subtype)],
        }
    }
}

/// Token usage information for a turn.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub input_tokens: u64,

    #[serde(default)]
    pub output_tokens: u64,

    #[serde(default)]
    pub cache_read_input_tokens: u64,

    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

// ============================================================================
// Outgoing messages
// ============================================================================

/// A user turn written to the CLI's stdin.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "user")]
pub struct UserInput<'a> {
    pub message: UserInputMessage<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserInputMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> UserInput<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            message: UserInputMessage {
                role: "user",
                content,
            },
        }
    }
}
