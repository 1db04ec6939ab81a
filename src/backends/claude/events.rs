//! Translation of Claude CLI stream events into canonical events.
//!
//! Text is forwarded as it streams. Tool calls are reassembled from their
//! `input_json_delta` fragments so the finished call can be shown with a
//! short detail (file path, command, ...) once its block closes.

use crate::backends::errors::classify_vendor_message;
use crate::backends::stream::WireAdapter;
use crate::backends::types::{CanonicalEvent, SummaryInfo};

use super::cli_protocol::{BlockDelta, BlockStart, CliEvent, ResultEvent, StreamEvent};
use super::tool_utils::extract_tool_detail;

/// Mutable state for one adapter invocation.
#[derive(Debug, Default)]
struct AdapterState {
    has_emitted_text: bool,
    pending_tool_name: Option<String>,
    pending_tool_json: String,
}

/// Adapter for one Claude turn.
#[derive(Debug, Default)]
pub struct ClaudeAdapter {
    state: AdapterState,
    finished: bool,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_stream_event(&mut self, event: StreamEvent) -> Vec<CanonicalEvent> {
        match event {
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
                ..
            } => {
                if text.is_empty() {
                    return Vec::new();
                }
                self.state.has_emitted_text = true;
                vec![CanonicalEvent::text(text)]
            }
            StreamEvent::ContentBlockStart {
                content_block: BlockStart::ToolUse { name, .. },
                ..
            } => {
                if let Some(previous) = self.state.pending_tool_name.take() {
                    log::debug!("[claude] tool {} never closed, dropping its input", previous);
                }
                self.state.pending_tool_name = Some(name.clone());
                self.state.pending_tool_json.clear();
                vec![CanonicalEvent::tool_start(name)]
            }
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::InputJsonDelta { partial_json },
                ..
            } => {
                if self.state.pending_tool_name.is_some() {
                    self.state.pending_tool_json.push_str(&partial_json);
                }
                Vec::new()
            }
            StreamEvent::ContentBlockStop { .. } => {
                let Some(name) = self.state.pending_tool_name.take() else {
                    return Vec::new();
                };
                let raw = std::mem::take(&mut self.state.pending_tool_json);
                let detail = extract_tool_detail(&raw);
                vec![CanonicalEvent::tool_end(name, detail)]
            }
            _ => Vec::new(),
        }
    }

    fn handle_result(&mut self, result: ResultEvent) -> Vec<CanonicalEvent> {
        self.finished = true;

        if !result.is_success() {
            log::debug!("[claude] turn failed ({})", result.subtype);
            let errors = result
                .error_messages()
                .iter()
                .map(|message| classify_vendor_message(message))
                .collect();
            return vec![CanonicalEvent::failure(errors)];
        }

        let mut events = Vec::with_capacity(2);
        if !self.state.has_emitted_text {
            if let Some(text) = result.result.as_deref().filter(|text| !text.is_empty()) {
                self.state.has_emitted_text = true;
                events.push(CanonicalEvent::text(text));
            }
        }

        let usage = result.usage.unwrap_or_default();
        events.push(CanonicalEvent::success(SummaryInfo {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            num_turns: result.num_turns.unwrap_or(0),
            duration_ms: result.duration_ms.unwrap_or(0),
        }));
        events
    }
}

impl WireAdapter for ClaudeAdapter {
    type Wire = CliEvent;
    const LABEL: &'static str = "claude";

    fn on_event(&mut self, event: CliEvent) -> Vec<CanonicalEvent> {
        match event {
            CliEvent::System(system) => {
                if system.subtype == "init" {
                    log::info!(
                        "[claude] session {} (model {})",
                        system.session_id.as_deref().unwrap_or("unknown"),
                        system.model.as_deref().unwrap_or("default")
                    );
                }
                Vec::new()
            }
            CliEvent::StreamEvent(envelope) => self.handle_stream_event(envelope.event),
            CliEvent::Result(result) => self.handle_result(result),
            CliEvent::Unknown => Vec::new(),
        }
    }

    fn finished(&self) -> bool {
        self.finished
    }
}
