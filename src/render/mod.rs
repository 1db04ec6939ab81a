//! Terminal rendering of canonical events.
//!
//! Rendering is stateful: whether a tool line or summary needs a leading line
//! break depends on what the previous call wrote, so callers keep one
//! [`RenderState`] per run (or per interactive session) and pass it to every
//! [`consume`] call.

mod redact;

pub use redact::{detail_line, redact_secrets};

use crossterm::style::{style, Stylize};
use std::io::{self, Write};

use crate::backends::{CanonicalEvent, SummaryInfo};

/// Cross-call render state, owned by a single consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    /// Whether the last character written to the normal sink was a newline.
    pub last_char_was_newline: bool,
    /// Whether any assistant text has been written yet.
    pub has_emitted_text: bool,
    pub pending_tool_name: Option<String>,
    pub pending_tool_json: String,
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            last_char_was_newline: true,
            has_emitted_text: false,
            pending_tool_name: None,
            pending_tool_json: String::new(),
        }
    }

    /// Terminates the current line unless the last write already did.
    pub fn ensure_newline(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if !self.last_char_was_newline {
            out.write_all(b"\n")?;
            self.last_char_was_newline = true;
        }
        Ok(())
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes one canonical event.
///
/// Failures go to `err` when given, otherwise to `out`.
pub fn consume(
    event: &CanonicalEvent,
    out: &mut dyn Write,
    state: &mut RenderState,
    err: Option<&mut dyn Write>,
) -> io::Result<()> {
    match event {
        CanonicalEvent::TextDelta { text } => {
            let text = if state.has_emitted_text {
                text.as_str()
            } else {
                text.trim_start_matches(['\n', '\r'])
            };
            if text.is_empty() {
                return Ok(());
            }
            write!(out, "{}", style(text).cyan())?;
            state.has_emitted_text = true;
            state.last_char_was_newline = text.ends_with('\n');
        }
        CanonicalEvent::ToolStart { name } => {
            state.pending_tool_name = Some(name.clone());
            state.pending_tool_json.clear();
        }
        CanonicalEvent::ToolEnd { name, detail } => {
            state.ensure_newline(out)?;
            let line = match detail {
                Some(detail) => format!("[{name}] {detail}"),
                None => format!("[{name}]"),
            };
            writeln!(out, "{}", style(line).dim())?;
            state.last_char_was_newline = true;
            state.pending_tool_name = None;
            state.pending_tool_json.clear();
        }
        CanonicalEvent::Result {
            success: true,
            summary,
            ..
        } => {
            state.ensure_newline(out)?;
            let summary = summary.unwrap_or_default();
            writeln!(out, "{}", style(format_summary(&summary)).dim())?;
            state.last_char_was_newline = true;
        }
        CanonicalEvent::Result {
            success: false,
            errors,
            ..
        } => write_failure(out, state, err, "Run failed", errors)?,
        CanonicalEvent::Error { message } => {
            write_failure(out, state, err, "Error", std::slice::from_ref(message))?
        }
    }
    out.flush()
}

fn write_failure(
    out: &mut dyn Write,
    state: &mut RenderState,
    err: Option<&mut dyn Write>,
    kind: &str,
    messages: &[String],
) -> io::Result<()> {
    // Finish the current output line so the block starts in column zero.
    state.ensure_newline(out)?;

    let mut block = format!("{}\n", style(format!("✗ {kind}")).red().bold());
    for message in messages {
        for line in message.lines() {
            block.push_str("  ");
            block.push_str(line);
            block.push('\n');
        }
    }

    match err {
        Some(err) => {
            err.write_all(block.as_bytes())?;
            err.flush()
        }
        None => {
            out.write_all(block.as_bytes())?;
            state.last_char_was_newline = true;
            Ok(())
        }
    }
}

/// One-line usage summary, e.g. `1500 tokens · 3 turns · 12.3s`.
pub fn format_summary(summary: &SummaryInfo) -> String {
    let turns = if summary.num_turns == 1 { "turn" } else { "turns" };
    format!(
        "{} tokens · {} {} · {:.1}s",
        summary.total_tokens(),
        summary.num_turns,
        turns,
        summary.duration_ms as f64 / 1000.0
    )
}
