//! Codex JSONL event types and translation to canonical events.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;

use crate::backends::errors::classify_vendor_message;
use crate::backends::stream::WireAdapter;
use crate::backends::types::{CanonicalEvent, SummaryInfo};
use crate::render::detail_line;

/// Warning Codex reports as an error item when experimental features are on.
const UNSTABLE_FEATURES_WARNING: &str = "Under-development features";

/// Raw event from Codex CLI JSONL output.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted { thread_id: String },

    #[serde(rename = "turn.started")]
    TurnStarted,

    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<CodexUsage>,
    },

    #[serde(rename = "turn.failed")]
    TurnFailed { error: CodexErrorInfo },

    #[serde(rename = "item.started")]
    ItemStarted { item: CodexItem },

    #[serde(rename = "item.updated")]
    ItemUpdated { item: CodexItem },

    #[serde(rename = "item.completed")]
    ItemCompleted { item: CodexItem },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(other)]
    Unknown,
}

/// Item types within Codex events.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum CodexItem {
    #[serde(rename = "agent_message")]
    AgentMessage {
        #[serde(default)]
        text: Value,
    },

    #[serde(rename = "reasoning")]
    Reasoning,

    #[serde(rename = "command_execution")]
    CommandExecution {
        id: String,
        #[serde(default)]
        command: String,
        #[serde(default)]
        exit_code: Option<i64>,
    },

    #[serde(rename = "file_change")]
    FileChange {
        id: String,
        #[serde(default)]
        changes: Vec<FileUpdate>,
    },

    #[serde(rename = "mcp_tool_call")]
    McpToolCall {
        id: String,
        #[serde(default)]
        server: String,
        tool: String,
    },

    #[serde(rename = "web_search")]
    WebSearch {
        #[serde(default)]
        query: String,
    },

    #[serde(rename = "todo_list")]
    TodoList,

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct FileUpdate {
    pub path: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Token usage from Codex.
#[derive(Debug, Default, Deserialize)]
pub struct CodexUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct CodexErrorInfo {
    pub message: String,
}

/// Adapter for one Codex turn.
///
/// Codex reports most tools as discrete items. Starts are forwarded as they
/// arrive; a completion whose start was never seen gets a synthesized start so
/// consumers always see the pair in order.
pub struct CodexAdapter {
    started_at: Instant,
    open_items: HashSet<String>,
    finished: bool,
}

impl CodexAdapter {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            open_items: HashSet::new(),
            finished: false,
        }
    }

    fn start_item(&mut self, id: &str, name: &str) -> Vec<CanonicalEvent> {
        self.open_items.insert(id.to_string());
        vec![CanonicalEvent::tool_start(name)]
    }

    fn end_item(&mut self, id: &str, name: &str, detail: Option<String>) -> Vec<CanonicalEvent> {
        let mut events = Vec::with_capacity(2);
        if !self.open_items.remove(id) {
            events.push(CanonicalEvent::tool_start(name));
        }
        events.push(CanonicalEvent::tool_end(name, detail));
        events
    }

    fn item_started(&mut self, item: CodexItem) -> Vec<CanonicalEvent> {
        match item {
            CodexItem::CommandExecution { id, .. } => self.start_item(&id, "Bash"),
            CodexItem::FileChange { id, .. } => self.start_item(&id, "Edit"),
            CodexItem::McpToolCall { id, tool, .. } => self.start_item(&id, &tool),
            _ => Vec::new(),
        }
    }

    fn item_completed(&mut self, item: CodexItem) -> Vec<CanonicalEvent> {
        match item {
            CodexItem::AgentMessage { text } => match text.as_str() {
                Some(text) if !text.is_empty() => vec![CanonicalEvent::text(text)],
                _ => Vec::new(),
            },
            CodexItem::CommandExecution {
                id,
                command,
                exit_code,
            } => {
                if exit_code.is_none() {
                    log::debug!("[codex] command {} completed without exit code", id);
                    self.open_items.remove(&id);
                    return Vec::new();
                }
                self.end_item(&id, "Bash", detail_line(&command))
            }
            CodexItem::FileChange { id, changes } => {
                let detail = changes.first().and_then(|change| detail_line(&change.path));
                self.end_item(&id, "Edit", detail)
            }
            CodexItem::McpToolCall { id, server, tool } => {
                log::debug!("[codex] mcp tool {}/{} finished", server, tool);
                self.end_item(&id, &tool, None)
            }
            CodexItem::WebSearch { query } => vec![
                CanonicalEvent::tool_start("WebSearch"),
                CanonicalEvent::tool_end("WebSearch", detail_line(&query)),
            ],
            CodexItem::Error { message } => {
                if message.contains(UNSTABLE_FEATURES_WARNING) {
                    log::debug!("[codex] ignoring warning: {}", message);
                    Vec::new()
                } else {
                    vec![CanonicalEvent::Error { message }]
                }
            }
            CodexItem::Reasoning | CodexItem::TodoList | CodexItem::Unknown => Vec::new(),
        }
    }

    fn fail(&mut self, message: &str) -> Vec<CanonicalEvent> {
        self.finished = true;
        vec![CanonicalEvent::failure(vec![classify_vendor_message(message)])]
    }
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WireAdapter for CodexAdapter {
    type Wire = CodexEvent;
    const LABEL: &'static str = "codex";

    fn on_event(&mut self, event: CodexEvent) -> Vec<CanonicalEvent> {
        match event {
            CodexEvent::ThreadStarted { thread_id } => {
                log::info!("[codex] thread {}", thread_id);
                Vec::new()
            }
            CodexEvent::TurnStarted | CodexEvent::ItemUpdated { .. } | CodexEvent::Unknown => {
                Vec::new()
            }
            CodexEvent::TurnCompleted { usage } => {
                self.finished = true;
                let usage = usage.unwrap_or_default();
                vec![CanonicalEvent::success(SummaryInfo {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    num_turns: 1,
                    duration_ms: self.started_at.elapsed().as_millis() as u64,
                })]
            }
            CodexEvent::TurnFailed { error } => self.fail(&error.message),
            CodexEvent::Error { message } => self.fail(&message),
            CodexEvent::ItemStarted { item } => self.item_started(item),
            CodexEvent::ItemCompleted { item } => self.item_completed(item),
        }
    }

    fn finished(&self) -> bool {
        self.finished
    }
}
