//! Claude Code backend implementation.

mod adapter;
pub mod cli_protocol;
pub mod events;
mod tool_utils;

pub use adapter::{ClaudeProvider, ClaudeSession};
pub use events::ClaudeAdapter;
