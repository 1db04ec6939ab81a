//! Multi-turn REPL over an interactive vendor session.

use crossterm::style::{style, Stylize};
use futures::StreamExt;
use std::io::{self, Write};
use tokio::io::AsyncBufRead;

use crate::backends::{
    classified_message, prepend_context, CanonicalEvent, InteractiveSession,
    InteractiveSessionConfig, Provider,
};
use crate::render::{self, RenderState};

use super::input::LineInput;
use super::run_loop::LoopReport;
use super::signals::{SignalGuard, SignalSource};

const PROMPT: &str = "> ";

#[derive(Debug, Clone, Default)]
pub struct InteractiveOptions {
    /// First message; when absent the first line is read from the input.
    pub initial_input: Option<String>,
    pub model: Option<String>,
    /// Context references prepended to the first message only.
    pub context: Vec<String>,
}

/// Runs a REPL until the input ends, an empty line is entered, or one of
/// `signals` fires.
///
/// A signal closes `input`, so the pending read resolves as end of input,
/// and force-releases the vendor side when the session supports it. The
/// report counts turns sent and turns that failed.
pub async fn run_interactive<R>(
    provider: &dyn Provider,
    options: InteractiveOptions,
    input: &mut LineInput<R>,
    signals: Vec<SignalSource>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<LoopReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut state = RenderState::new();
    let mut report = LoopReport::default();

    if let Err(error) = provider.preflight() {
        log::warn!("[{}] preflight failed: {}", provider.name(), error);
        report.failed += 1;
        let failure = CanonicalEvent::failure(vec![classified_message(&error)]);
        render::consume(&failure, out, &mut state, Some(err))?;
        return Ok(report);
    }

    let config = InteractiveSessionConfig {
        model: options.model.clone(),
        context: options.context.clone(),
    };
    let mut session = match provider.create_interactive_session(config).await {
        Ok(session) => session,
        Err(error) => {
            log::warn!("[{}] session failed to open: {}", provider.name(), error);
            report.failed += 1;
            let failure = CanonicalEvent::failure(vec![classified_message(&error)]);
            render::consume(&failure, out, &mut state, Some(err))?;
            return Ok(report);
        }
    };
    log::info!("[{}] interactive session open", session.backend_kind());

    let guard = {
        let closer = input.closer();
        let abort = session.abort_handle();
        SignalGuard::install(signals, move |name| {
            log::debug!("{} closes the input", name);
            closer.cancel();
            if let Some(abort) = &abort {
                abort.cancel();
            }
        })
    };

    let result = converse(
        &mut *session,
        options,
        input,
        &mut state,
        &mut report,
        out,
        err,
    )
    .await;

    guard.remove().await;
    session.close().await;
    result.map(|()| report)
}

async fn converse<R>(
    session: &mut dyn InteractiveSession,
    options: InteractiveOptions,
    input: &mut LineInput<R>,
    state: &mut RenderState,
    report: &mut LoopReport,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut next = match options.initial_input.filter(|text| !text.trim().is_empty()) {
        Some(text) => Some(text),
        None => prompt_line(input, state, out).await?,
    };
    let mut first_turn = true;

    while let Some(text) = next {
        let message = if first_turn {
            prepend_context(&text, &options.context)
        } else {
            text
        };
        first_turn = false;

        report.attempted += 1;
        if !run_turn(session, &message, state, out, err).await? {
            report.failed += 1;
        }

        next = prompt_line(input, state, out).await?;
    }
    Ok(())
}

/// Sends one message and renders the turn. Returns whether it succeeded.
async fn run_turn(
    session: &mut dyn InteractiveSession,
    message: &str,
    state: &mut RenderState,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<bool> {
    if let Err(error) = session.send(message).await {
        log::warn!("[{}] turn failed to start: {}", session.backend_kind(), error);
        let failure = CanonicalEvent::failure(vec![classified_message(&error)]);
        render::consume(&failure, out, state, Some(err))?;
        return Ok(false);
    }

    let mut succeeded = true;
    let mut events = session.stream();
    while let Some(event) = events.next().await {
        if event.is_failure() {
            succeeded = false;
        }
        render::consume(&event, out, state, Some(&mut *err))?;
    }
    Ok(succeeded)
}

/// Prompts and reads the next message. Blank lines and end of input end the
/// conversation.
async fn prompt_line<R>(
    input: &mut LineInput<R>,
    state: &mut RenderState,
    out: &mut dyn Write,
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    state.ensure_newline(out)?;
    write!(out, "{}", style(PROMPT).bold())?;
    out.flush()?;

    let line = input.read_line().await?;
    // The terminal echoes the user's Enter.
    state.last_char_was_newline = true;

    match line {
        Some(line) if !line.trim().is_empty() => Ok(Some(line.trim_end().to_string())),
        Some(_) => Ok(None),
        None => {
            // EOF or a signal leaves the cursor after the prompt.
            writeln!(out)?;
            out.flush()?;
            Ok(None)
        }
    }
}
