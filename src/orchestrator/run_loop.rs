//! One-shot and looped runs.

use futures::StreamExt;
use std::io::{self, Write};

use crossterm::style::{style, Stylize};

use crate::backends::{classified_message, CancelHandle, CanonicalEvent, Provider, ProviderSessionConfig};
use crate::render::{self, RenderState};

/// How many times to run the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Single,
    Count(usize),
    Forever,
}

impl LoopMode {
    fn total(self) -> Option<usize> {
        match self {
            LoopMode::Single => Some(1),
            LoopMode::Count(n) => Some(n),
            LoopMode::Forever => None,
        }
    }
}

/// Outcome of a [`run_loop`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub attempted: usize,
    pub failed: usize,
}

impl LoopReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Centered `── Iteration i/N ──` header.
pub fn divider(index: usize, total: Option<usize>, width: usize) -> String {
    let label = match total {
        Some(total) => format!(" Iteration {index}/{total} "),
        None => format!(" Iteration {index} "),
    };
    format!("{label:─^width$}")
}

/// Runs the prompt according to `mode`, one fresh session per iteration.
///
/// A failing iteration is reported on `err` and the loop moves on. `stop` is
/// checked before and after every iteration, so an iteration that has started
/// always runs to completion.
pub async fn run_loop(
    provider: &dyn Provider,
    config: &ProviderSessionConfig,
    mode: LoopMode,
    stop: &CancelHandle,
    divider_width: usize,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<LoopReport> {
    let total = mode.total();
    let mut report = LoopReport::default();

    loop {
        if total.is_some_and(|total| report.attempted >= total) || stop.is_cancelled() {
            break;
        }

        report.attempted += 1;
        if mode != LoopMode::Single {
            if report.attempted > 1 {
                writeln!(out)?;
            }
            writeln!(
                out,
                "{}",
                style(divider(report.attempted, total, divider_width)).dim()
            )?;
        }

        if !run_iteration(provider, config.clone(), out, err).await? {
            report.failed += 1;
        }

        if stop.is_cancelled() {
            log::info!("Stop requested after iteration {}", report.attempted);
            break;
        }
    }

    Ok(report)
}

/// Drains one session through a fresh render state. Returns whether the run
/// succeeded.
async fn run_iteration(
    provider: &dyn Provider,
    config: ProviderSessionConfig,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<bool> {
    let mut state = RenderState::new();

    let mut events = match provider.create_session(config).await {
        Ok(events) => events,
        Err(error) => {
            log::warn!("[{}] session failed to start: {}", provider.name(), error);
            let failure = CanonicalEvent::failure(vec![classified_message(&error)]);
            render::consume(&failure, out, &mut state, Some(err))?;
            return Ok(false);
        }
    };

    let mut succeeded = true;
    while let Some(event) = events.next().await {
        if event.is_failure() {
            succeeded = false;
        }
        render::consume(&event, out, &mut state, Some(&mut *err))?;
    }
    Ok(succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{
        BackendKind, EventStream, InteractiveSession, InteractiveSessionConfig, ProviderError,
        SummaryInfo,
    };
    use async_trait::async_trait;
    use futures::stream;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};

    type Outcome = Result<EventStream<'static>, ProviderError>;

    /// Hands out one scripted outcome per `create_session` call.
    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Box<dyn FnOnce() -> Outcome + Send>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<Box<dyn FnOnce() -> Outcome + Send>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn kind(&self) -> BackendKind {
            BackendKind::Codex
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn preflight(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        fn known_aliases(&self) -> HashMap<&'static str, &'static str> {
            HashMap::new()
        }

        async fn create_session(
            &self,
            _config: ProviderSessionConfig,
        ) -> Result<EventStream<'static>, ProviderError> {
            *self.calls.lock() += 1;
            let outcome = self
                .outcomes
                .lock()
                .pop_front()
                .expect("unexpected create_session call");
            outcome()
        }

        async fn create_interactive_session(
            &self,
            _config: InteractiveSessionConfig,
        ) -> Result<Box<dyn InteractiveSession>, ProviderError> {
            unimplemented!()
        }
    }

    fn ok_stream() -> EventStream<'static> {
        stream::iter(vec![
            CanonicalEvent::text("PASS\n"),
            CanonicalEvent::success(SummaryInfo {
                input_tokens: 1,
                output_tokens: 1,
                num_turns: 1,
                duration_ms: 100,
            }),
        ])
        .boxed()
    }

    fn outcome(f: impl FnOnce() -> Outcome + Send + 'static) -> Box<dyn FnOnce() -> Outcome + Send> {
        Box::new(f)
    }

    fn ok() -> Box<dyn FnOnce() -> Outcome + Send> {
        outcome(|| Ok(ok_stream()))
    }

    fn config() -> ProviderSessionConfig {
        ProviderSessionConfig {
            prompt: "do the thing".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn divider_is_centered() {
        let line = divider(2, Some(3), 30);
        assert_eq!(line.chars().count(), 30);
        assert!(line.contains(" Iteration 2/3 "));
        assert!(line.starts_with('─') && line.ends_with('─'));
        assert!(divider(7, None, 30).contains(" Iteration 7 "));
    }

    #[tokio::test]
    async fn failing_iteration_does_not_stop_loop() {
        let provider = ScriptedProvider::new(vec![
            ok(),
            outcome(|| {
                Err(ProviderError::vendor(
                    "429 Too Many Requests: rate limit exceeded",
                ))
            }),
            ok(),
        ]);

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = run_loop(
            &provider,
            &config(),
            LoopMode::Count(3),
            &CancelHandle::new(),
            40,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert_eq!(report, LoopReport { attempted: 3, failed: 1 });
        let out = String::from_utf8_lossy(&out);
        let err = String::from_utf8_lossy(&err);
        assert!(out.contains("Iteration 1/3"));
        assert!(out.contains("Iteration 2/3"));
        assert!(out.contains("Iteration 3/3"));
        assert_eq!(out.matches("PASS").count(), 2);
        assert!(err.contains("Rate limit reached"));
        assert!(!out.contains("Rate limit reached"));
    }

    #[tokio::test]
    async fn failed_result_counts_as_failed_iteration() {
        let provider = ScriptedProvider::new(vec![outcome(|| {
            Ok(stream::iter(vec![CanonicalEvent::failure(vec!["boom".to_string()])]).boxed())
        })]);

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = run_loop(
            &provider,
            &config(),
            LoopMode::Single,
            &CancelHandle::new(),
            40,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert!(!report.all_succeeded());
        assert!(String::from_utf8_lossy(&err).contains("boom"));
    }

    #[tokio::test]
    async fn error_event_fails_iteration_despite_success_result() {
        let provider = ScriptedProvider::new(vec![outcome(|| {
            Ok(stream::iter(vec![
                CanonicalEvent::Error {
                    message: "connection reset by peer".to_string(),
                },
                CanonicalEvent::success(SummaryInfo::default()),
            ])
            .boxed())
        })]);

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = run_loop(
            &provider,
            &config(),
            LoopMode::Single,
            &CancelHandle::new(),
            40,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert_eq!(report, LoopReport { attempted: 1, failed: 1 });
    }

    #[tokio::test]
    async fn zero_iterations_run_nothing() {
        let provider = ScriptedProvider::new(Vec::new());

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = run_loop(
            &provider,
            &config(),
            LoopMode::Count(0),
            &CancelHandle::new(),
            40,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert_eq!(report.attempted, 0);
        assert_eq!(provider.calls(), 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn single_run_has_no_divider() {
        let provider = ScriptedProvider::new(vec![ok()]);

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = run_loop(
            &provider,
            &config(),
            LoopMode::Single,
            &CancelHandle::new(),
            40,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(provider.calls(), 1);
        assert!(!String::from_utf8_lossy(&out).contains("Iteration"));
    }

    #[tokio::test]
    async fn forever_finishes_in_flight_iteration_after_stop() {
        let stop = CancelHandle::new();
        let provider = ScriptedProvider::new(vec![
            ok(),
            outcome({
                let stop = stop.clone();
                move || {
                    stop.cancel();
                    Ok(ok_stream())
                }
            }),
        ]);

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = run_loop(
            &provider,
            &config(),
            LoopMode::Forever,
            &stop,
            40,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert_eq!(report, LoopReport { attempted: 2, failed: 0 });
        let out = String::from_utf8_lossy(&out);
        assert!(out.contains("Iteration 2 "));
        assert_eq!(out.matches("PASS").count(), 2);
    }

    #[tokio::test]
    async fn stop_before_start_runs_nothing() {
        let stop = CancelHandle::new();
        stop.cancel();
        let provider = ScriptedProvider::new(Vec::new());

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = run_loop(
            &provider,
            &config(),
            LoopMode::Forever,
            &stop,
            40,
            &mut out,
            &mut err,
        )
        .await
        .unwrap();

        assert_eq!(report.attempted, 0);
    }
}
