//! Shared utilities used by multiple backend adapters.

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::borrow::BorrowMut;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::errors::ProviderError;
use super::runtime::CancelHandle;
use super::stream::WireStream;

/// How many trailing stderr lines are kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// How long a child gets to exit on its own after stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type StderrTail = Arc<Mutex<VecDeque<String>>>;

/// A spawned vendor CLI speaking NDJSON on stdout.
pub struct CliProcess {
    label: &'static str,
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
    stderr_tail: StderrTail,
    stderr_task: Option<JoinHandle<()>>,
}

impl CliProcess {
    /// Spawns `cmd` with all three stdio streams piped.
    ///
    /// The child is killed if the handle is dropped without `finish`/`shutdown`.
    /// On unix it runs in its own process group, so a terminal Ctrl-C reaches
    /// only us and the child is stopped through this handle.
    pub fn spawn(mut cmd: Command, label: &'static str) -> Result<Self, ProviderError> {
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ProviderError::Spawn {
            program: program.clone(),
            source,
        })?;
        log::debug!("[{label}] spawned {program} (pid {:?})", child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Protocol(format!("Failed to capture {label} stdout")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProviderError::Protocol(format!("Failed to capture {label} stderr")))?;
        let stdin = child.stdin.take();

        let stderr_tail: StderrTail = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_task = spawn_stderr_drain(stderr, label, stderr_tail.clone());

        Ok(Self {
            label,
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            stderr_tail,
            stderr_task: Some(stderr_task),
        })
    }

    /// Writes one JSON value followed by a newline to the child's stdin.
    pub async fn write_line<T: Serialize>(&mut self, value: &T) -> Result<(), ProviderError> {
        let label = self.label;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ProviderError::Protocol(format!("{label} stdin is closed")))?;

        let mut payload = serde_json::to_string(value)
            .map_err(|e| ProviderError::Protocol(format!("Failed to encode {label} input: {e}")))?;
        payload.push('\n');

        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|source| ProviderError::Io { label, source })?;
        stdin
            .flush()
            .await
            .map_err(|source| ProviderError::Io { label, source })
    }

    /// Closes stdin so the child sees EOF on its input.
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, ProviderError> {
        let label = self.label;
        self.lines
            .next_line()
            .await
            .map_err(|source| ProviderError::Io { label, source })
    }

    /// Waits for the child to exit after stdout has ended.
    ///
    /// A non-zero exit becomes [`ProviderError::Exited`] carrying the tail of
    /// the child's stderr.
    pub async fn finish(&mut self) -> Result<(), ProviderError> {
        self.close_stdin();
        let label = self.label;
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| ProviderError::Io { label, source })?;

        if let Some(task) = self.stderr_task.take() {
            // The drain ends at stderr EOF, which follows process exit.
            if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
                log::debug!("[{label}] stderr drain still running after exit");
            }
        }

        if status.success() {
            log::debug!("[{label}] exited cleanly");
            return Ok(());
        }

        let stderr = self.stderr_tail.lock().iter().cloned().collect::<Vec<_>>().join("\n");
        Err(ProviderError::Exited {
            label,
            status: format_exit_status(&status),
            stderr,
        })
    }

    /// Kills the child immediately.
    pub async fn kill(&mut self) {
        self.close_stdin();
        if let Err(err) = self.child.kill().await {
            log::debug!("[{}] kill failed: {}", self.label, err);
        }
    }

    /// Closes stdin and gives the child a moment to exit before killing it.
    pub async fn shutdown(&mut self) {
        self.close_stdin();
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => log::debug!("[{}] exited ({})", self.label, format_exit_status(&status)),
            Ok(Err(err)) => log::debug!("[{}] wait failed: {}", self.label, err),
            Err(_) => {
                log::debug!("[{}] did not exit in time, killing", self.label);
                self.kill().await;
            }
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

/// Turns a process's stdout into a [`WireStream`].
///
/// Works with an owned process (one-shot runs) or a borrowed one (a turn of a
/// persistent session). When `cancel` fires the child is killed and the
/// stream ends with [`ProviderError::Cancelled`]. A non-zero exit after stdout
/// ends is reported as the stream's last item.
pub fn wire_stream_from<'a, P>(process: P, cancel: Option<CancelHandle>) -> WireStream<'a>
where
    P: BorrowMut<CliProcess> + Send + 'a,
{
    stream::unfold(Some((process, cancel)), |state| async move {
        let (mut process, cancel) = state?;

        let next = match &cancel {
            Some(cancel) => tokio::select! {
                line = process.borrow_mut().next_line() => line,
                _ = cancel.cancelled() => {
                    process.borrow_mut().kill().await;
                    Err(ProviderError::Cancelled)
                }
            },
            None => process.borrow_mut().next_line().await,
        };

        match next {
            Ok(Some(line)) => Some((Ok(line), Some((process, cancel)))),
            Ok(None) => match process.borrow_mut().finish().await {
                Ok(()) => None,
                Err(err) => Some((Err(err), None)),
            },
            Err(err) => Some((Err(err), None)),
        }
    })
    .boxed()
}

/// Spawn a tokio task that drains stderr line-by-line, logging non-empty lines.
///
/// Prevents deadlock when the child process writes to stderr faster than we
/// consume it. The last few lines are kept in `tail` for error reports.
pub fn spawn_stderr_drain(
    stderr: ChildStderr,
    label: &'static str,
    tail: StderrTail,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = lines.next_line().await.unwrap_or(None) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            log::debug!("[{label} stderr] {line}");
            let mut tail = tail.lock();
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
    })
}

pub fn format_exit_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Locates a CLI binary.
///
/// An explicit path is used as-is when it exists. Bare names are looked up
/// on `PATH`.
pub fn find_cli(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    #[cfg(target_os = "windows")]
    let which = std::process::Command::new("where").arg(program).output();
    #[cfg(not(target_os = "windows"))]
    let which = std::process::Command::new("which").arg(program).output();

    match which {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| PathBuf::from(line.trim()))
            .filter(|path| !path.as_os_str().is_empty()),
        _ => None,
    }
}

/// True when the environment variable is set to something non-blank.
pub fn env_present(name: &str) -> bool {
    std::env::var(name)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

/// Prefixes `prompt` with `@path` references, one per line.
pub fn prepend_context(prompt: &str, context: &[String]) -> String {
    if context.is_empty() {
        return prompt.to_string();
    }
    let refs = context
        .iter()
        .map(|path| format!("@{path}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{refs}\n\n{prompt}")
}
