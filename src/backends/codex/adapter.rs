//! Codex CLI provider.
//!
//! Every turn is a separate `codex exec --json` process. Conversation state
//! lives on the Codex side and is addressed by the thread id announced in the
//! first turn's `thread.started` event; later turns run `exec resume <id>`.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::backends::errors::{classified_message, ProviderError};
use crate::backends::session::InteractiveSession;
use crate::backends::stream::translate;
use crate::backends::types::{
    failure_stream, BackendKind, EventStream, InteractiveSessionConfig, Provider,
    ProviderSessionConfig,
};
use crate::backends::utils::{env_present, find_cli, wire_stream_from, CliProcess};
use crate::config::VendorSettings;

use super::cli_protocol::{exec_args, thread_id_from_line};
use super::events::CodexAdapter;

const DEFAULT_PROGRAM: &str = "codex";

const CREDENTIAL_ENV: [&str; 2] = ["OPENAI_API_KEY", "CODEX_API_KEY"];

/// Codex CLI provider implementation.
pub struct CodexProvider {
    settings: VendorSettings,
}

impl CodexProvider {
    pub fn new(settings: VendorSettings) -> Self {
        Self { settings }
    }

    fn program(&self) -> &str {
        self.settings.cli_path.as_deref().unwrap_or(DEFAULT_PROGRAM)
    }

    fn model_for(&self, requested: Option<String>) -> Option<String> {
        requested.or_else(|| self.resolve_model(self.settings.model.as_deref()))
    }
}

impl Default for CodexProvider {
    fn default() -> Self {
        Self::new(VendorSettings::default())
    }
}

/// Directory holding Codex state (`$CODEX_HOME`, else `~/.codex`).
fn codex_home() -> Option<PathBuf> {
    std::env::var_os("CODEX_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".codex")))
}

/// Whether Codex credentials are available through the environment or the
/// `auth.json` written by `codex login`.
pub(crate) fn has_credentials(codex_home: Option<&Path>, env_set: impl Fn(&str) -> bool) -> bool {
    if CREDENTIAL_ENV.iter().any(|name| env_set(name)) {
        return true;
    }
    codex_home
        .map(|home| home.join("auth.json").is_file())
        .unwrap_or(false)
}

fn spawn_exec(
    program: &str,
    settings: &VendorSettings,
    model: Option<&str>,
    thread_id: Option<&str>,
    prompt: &str,
) -> Result<CliProcess, ProviderError> {
    let mut cmd = Command::new(program);
    cmd.args(exec_args(settings, model, thread_id, prompt));
    let mut process = CliProcess::spawn(cmd, "codex")?;
    // The prompt travels as an argument; codex must not wait on stdin.
    process.close_stdin();
    Ok(process)
}

#[async_trait]
impl Provider for CodexProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Codex
    }

    fn name(&self) -> &'static str {
        "codex"
    }

    fn preflight(&self) -> Result<(), ProviderError> {
        if find_cli(self.program()).is_none() {
            return Err(ProviderError::Unavailable(format!(
                "Codex CLI (`{}`) not found. Install it with `npm install -g @openai/codex`.",
                self.program()
            )));
        }
        if !has_credentials(codex_home().as_deref(), env_present) {
            return Err(ProviderError::Unavailable(
                "Codex is not authenticated. Run `codex login`, or set OPENAI_API_KEY.".to_string(),
            ));
        }
        Ok(())
    }

    fn known_aliases(&self) -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("codex", "gpt-5-codex"),
            ("gpt5", "gpt-5"),
            ("mini", "gpt-5-codex-mini"),
        ])
    }

    async fn create_session(
        &self,
        config: ProviderSessionConfig,
    ) -> Result<EventStream<'static>, ProviderError> {
        if let Err(err) = self.preflight() {
            return Ok(failure_stream(classified_message(&err)));
        }

        let model = self.model_for(config.model.clone());
        let process = spawn_exec(
            self.program(),
            &self.settings,
            model.as_deref(),
            None,
            &config.message(),
        )?;
        Ok(translate(wire_stream_from(process, None), CodexAdapter::new()))
    }

    async fn create_interactive_session(
        &self,
        config: InteractiveSessionConfig,
    ) -> Result<Box<dyn InteractiveSession>, ProviderError> {
        self.preflight()?;

        Ok(Box::new(CodexThread {
            program: self.program().to_string(),
            settings: self.settings.clone(),
            model: self.model_for(config.model),
            thread_id: None,
            process: None,
            turn_pending: false,
        }))
    }
}

/// A Codex conversation addressed by thread id.
pub struct CodexThread {
    program: String,
    settings: VendorSettings,
    model: Option<String>,
    thread_id: Option<String>,
    /// The `exec` process of the current turn.
    process: Option<CliProcess>,
    turn_pending: bool,
}

impl CodexThread {
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }
}

#[async_trait]
impl InteractiveSession for CodexThread {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Codex
    }

    async fn send(&mut self, text: &str) -> Result<(), ProviderError> {
        if let Some(mut previous) = self.process.take() {
            previous.kill().await;
        }
        let process = spawn_exec(
            &self.program,
            &self.settings,
            self.model.as_deref(),
            self.thread_id.as_deref(),
            text,
        )?;
        self.process = Some(process);
        self.turn_pending = true;
        Ok(())
    }

    fn stream(&mut self) -> EventStream<'_> {
        if !std::mem::take(&mut self.turn_pending) {
            return stream::empty().boxed();
        }
        let Self {
            process, thread_id, ..
        } = self;
        let Some(process) = process.as_mut() else {
            return stream::empty().boxed();
        };

        let wire = wire_stream_from(process, None)
            .inspect(move |line| {
                if let Ok(line) = line {
                    if let Some(id) = thread_id_from_line(line) {
                        *thread_id = Some(id);
                    }
                }
            })
            .boxed();
        translate(wire, CodexAdapter::new())
    }

    async fn close(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill().await;
        }
    }
}
