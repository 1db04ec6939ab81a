//! Drivers that turn provider sessions into terminal output.
//!
//! [`run_loop`] runs a prompt once, N times, or until stopped, each time in a
//! fresh session. [`run_interactive`] keeps one vendor session open and
//! feeds it lines from the user.

mod input;
mod interactive;
mod run_loop;
mod signals;

pub use input::LineInput;
pub use interactive::{run_interactive, InteractiveOptions};
pub use run_loop::{divider, run_loop, LoopMode, LoopReport};
pub use signals::{os_signals, SignalGuard, SignalSource};

use crate::backends::ProviderSessionConfig;

/// Everything the command line decides about a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Provider name; `None` selects the configured default.
    pub provider: Option<String>,
    /// Resolved model id; `None` leaves the choice to the vendor.
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub context: Vec<String>,
    pub mode: LoopMode,
    pub interactive: bool,
}

impl RunOptions {
    /// Session config for loop mode, if a prompt was given.
    pub fn session_config(&self) -> Option<ProviderSessionConfig> {
        let prompt = self.prompt.as_deref().filter(|p| !p.trim().is_empty())?;
        Some(ProviderSessionConfig {
            prompt: prompt.to_string(),
            model: self.model.clone(),
            context: self.context.clone(),
        })
    }

    pub fn interactive_options(&self) -> InteractiveOptions {
        InteractiveOptions {
            initial_input: self.prompt.clone(),
            model: self.model.clone(),
            context: self.context.clone(),
        }
    }
}
