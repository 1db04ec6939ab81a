//! Run prompts against the Claude Code and Codex CLIs from one terminal.
//!
//! Vendor output is normalized into [`backends::CanonicalEvent`]s, rendered by
//! [`render`], and driven either as a one-shot or looped run or as an
//! interactive conversation by [`orchestrator`].

pub mod backends;
pub mod config;
pub mod orchestrator;
pub mod render;
