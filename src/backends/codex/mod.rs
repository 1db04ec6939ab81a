//! Codex CLI backend implementation.

mod adapter;
mod cli_protocol;
pub mod events;

pub use adapter::{CodexProvider, CodexThread};
pub use events::CodexAdapter;
