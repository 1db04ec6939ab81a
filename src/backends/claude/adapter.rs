//! Claude Code provider.
//!
//! Spawns the `claude` CLI in stream-json mode. A one-shot run writes a single
//! user message and closes stdin; an interactive session keeps the process
//! alive and writes one user message per turn.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use uuid::Uuid;

use crate::backends::errors::{classified_message, ProviderError};
use crate::backends::runtime::CancelHandle;
use crate::backends::session::InteractiveSession;
use crate::backends::stream::translate;
use crate::backends::types::{
    failure_stream, BackendKind, EventStream, InteractiveSessionConfig, Provider,
    ProviderSessionConfig,
};
use crate::backends::utils::{env_present, find_cli, wire_stream_from, CliProcess};
use crate::config::VendorSettings;

use super::cli_protocol::UserInput;
use super::events::ClaudeAdapter;

const DEFAULT_PROGRAM: &str = "claude";

/// Environment variables that authenticate the CLI without a login.
const CREDENTIAL_ENV: [&str; 3] = [
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_AUTH_TOKEN",
    "CLAUDE_CODE_OAUTH_TOKEN",
];

/// Files `claude /login` leaves behind, relative to the home directory.
const CREDENTIAL_FILES: [&str; 2] = [".claude/.credentials.json", ".claude.json"];

/// Claude Code provider implementation.
pub struct ClaudeProvider {
    settings: VendorSettings,
}

impl ClaudeProvider {
    pub fn new(settings: VendorSettings) -> Self {
        Self { settings }
    }

    fn program(&self) -> &str {
        self.settings.cli_path.as_deref().unwrap_or(DEFAULT_PROGRAM)
    }

    fn model_for(&self, requested: Option<String>) -> Option<String> {
        requested.or_else(|| self.resolve_model(self.settings.model.as_deref()))
    }

    fn spawn(&self, model: Option<&str>, session_id: Option<&str>) -> Result<CliProcess, ProviderError> {
        let mut cmd = Command::new(self.program());
        cmd.args(cli_args(&self.settings, model, session_id));
        CliProcess::spawn(cmd, "claude")
    }
}

impl Default for ClaudeProvider {
    fn default() -> Self {
        Self::new(VendorSettings::default())
    }
}

/// Arguments for a stream-json conversation with the CLI.
pub(crate) fn cli_args(
    settings: &VendorSettings,
    model: Option<&str>,
    session_id: Option<&str>,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-p",
        "--output-format",
        "stream-json",
        "--verbose",
        "--input-format",
        "stream-json",
        "--include-partial-messages",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();

    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    if let Some(mode) = settings.permission_mode.as_deref() {
        if mode == "bypassPermissions" {
            args.push("--dangerously-skip-permissions".to_string());
        } else {
            args.push("--permission-mode".to_string());
            args.push(mode.to_string());
        }
    }
    if let Some(session_id) = session_id {
        args.push("--session-id".to_string());
        args.push(session_id.to_string());
    }
    args.extend(settings.extra_args.iter().cloned());
    args
}

/// Whether Claude credentials are available through the environment or files
/// under `home`.
pub(crate) fn has_credentials(home: Option<&Path>, env_set: impl Fn(&str) -> bool) -> bool {
    if CREDENTIAL_ENV.iter().any(|name| env_set(name)) {
        return true;
    }
    home.map(|home| CREDENTIAL_FILES.iter().any(|file| home.join(file).is_file()))
        .unwrap_or(false)
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Claude
    }

    fn name(&self) -> &'static str {
        "claude"
    }

    fn preflight(&self) -> Result<(), ProviderError> {
        if find_cli(self.program()).is_none() {
            return Err(ProviderError::Unavailable(format!(
                "Claude Code CLI (`{}`) not found. Install it with `npm install -g @anthropic-ai/claude-code`.",
                self.program()
            )));
        }
        if !has_credentials(dirs::home_dir().as_deref(), env_present) {
            return Err(ProviderError::Unavailable(
                "Claude Code is not authenticated. Run `claude` and complete `/login`, or set ANTHROPIC_API_KEY."
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn known_aliases(&self) -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("sonnet", "claude-sonnet-4-5"),
            ("opus", "claude-opus-4-1"),
            ("haiku", "claude-haiku-4-5"),
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
        let mut process = self.spawn(model.as_deref(), None)?;
        process.write_line(&UserInput::new(&config.message())).await?;
        process.close_stdin();

        Ok(translate(wire_stream_from(process, None), ClaudeAdapter::new()))
    }

    async fn create_interactive_session(
        &self,
        config: InteractiveSessionConfig,
    ) -> Result<Box<dyn InteractiveSession>, ProviderError> {
        self.preflight()?;

        let model = self.model_for(config.model);
        let session_id = Uuid::new_v4().to_string();
        let process = self.spawn(model.as_deref(), Some(&session_id))?;
        log::info!("[claude] interactive session {}", session_id);

        Ok(Box::new(ClaudeSession {
            process: Some(process),
            abort: CancelHandle::new(),
            turn_pending: false,
        }))
    }
}

/// A long-lived `claude` process carrying one conversation.
pub struct ClaudeSession {
    process: Option<CliProcess>,
    abort: CancelHandle,
    turn_pending: bool,
}

#[async_trait]
impl InteractiveSession for ClaudeSession {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Claude
    }

    async fn send(&mut self, text: &str) -> Result<(), ProviderError> {
        if self.abort.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| ProviderError::Protocol("Claude session is closed".to_string()))?;
        process.write_line(&UserInput::new(text)).await?;
        self.turn_pending = true;
        Ok(())
    }

    fn stream(&mut self) -> EventStream<'_> {
        if !std::mem::take(&mut self.turn_pending) {
            return stream::empty().boxed();
        }
        match self.process.as_mut() {
            Some(process) => translate(
                wire_stream_from(process, Some(self.abort.clone())),
                ClaudeAdapter::new(),
            ),
            None => stream::empty().boxed(),
        }
    }

    async fn close(&mut self) {
        if let Some(mut process) = self.process.take() {
            if self.abort.is_cancelled() {
                process.kill().await;
            } else {
                process.shutdown().await;
            }
        }
    }

    fn abort_handle(&self) -> Option<CancelHandle> {
        Some(self.abort.clone())
    }
}
