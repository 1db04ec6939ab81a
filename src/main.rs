use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use polyagent::backends::claude::ClaudeProvider;
use polyagent::backends::codex::CodexProvider;
use polyagent::backends::{BackendKind, CancelHandle, Provider, ProviderRegistry};
use polyagent::config::{self, Settings};
use polyagent::orchestrator::{
    os_signals, run_interactive, run_loop, LineInput, LoopMode, RunOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Vendor CLI to drive: claude or codex
    #[arg(long, short = 'p')]
    provider: Option<String>,

    /// Model id or alias (sonnet, opus, haiku, codex, gpt5, mini)
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// File or directory the agent should look at first. Repeatable.
    #[arg(long = "context", short = 'c', value_name = "PATH")]
    context: Vec<String>,

    /// Run the prompt N times, each in a fresh session
    #[arg(long, short = 'n', conflicts_with_all = ["forever", "interactive"])]
    count: Option<usize>,

    /// Run the prompt until interrupted with Ctrl-C
    #[arg(long, conflicts_with = "interactive")]
    forever: bool,

    /// Keep one session open and read follow-up messages from stdin
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Prompt to run. In interactive mode, the first message.
    #[arg(value_name = "PROMPT")]
    prompt: Option<String>,
}

impl Cli {
    fn mode(&self) -> LoopMode {
        if self.forever {
            LoopMode::Forever
        } else {
            match self.count {
                Some(count) => LoopMode::Count(count),
                None => LoopMode::Single,
            }
        }
    }

    fn into_options(self, model: Option<String>) -> RunOptions {
        RunOptions {
            mode: self.mode(),
            provider: self.provider,
            model,
            prompt: self.prompt,
            context: self.context,
            interactive: self.interactive,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_registry(settings: &Settings) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(ClaudeProvider::new(settings.claude.clone())));
    registry.register(Arc::new(CodexProvider::new(settings.codex.clone())));
    if let Some(name) = settings.default_provider.as_deref() {
        let kind = name
            .parse::<BackendKind>()
            .context("invalid default_provider in settings")?;
        registry.set_default(kind);
    }
    Ok(registry)
}

/// Returns whether every run or turn succeeded.
fn run(cli: Cli) -> Result<bool> {
    let settings = config::load_settings();
    let registry = build_registry(&settings)?;
    let provider = registry
        .resolve(cli.provider.as_deref())
        .with_context(|| {
            let known: Vec<String> = registry
                .available_backends()
                .iter()
                .map(ToString::to_string)
                .collect();
            format!("available providers: {}", known.join(", "))
        })?;
    let model = provider.resolve_model(cli.model.as_deref());
    let options = cli.into_options(model);
    log::debug!(
        "provider={} model={:?} mode={:?}",
        provider.name(),
        options.model,
        options.mode
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let result = runtime.block_on(dispatch(
        provider.as_ref(),
        &options,
        settings.divider_width,
    ));
    // A stdin read in flight cannot be interrupted; don't wait for it.
    runtime.shutdown_background();
    result
}

async fn dispatch(
    provider: &dyn Provider,
    options: &RunOptions,
    divider_width: usize,
) -> Result<bool> {
    let mut out = io::stdout();
    let mut err = io::stderr();

    if options.interactive {
        let mut input = LineInput::stdin();
        let signals = os_signals().context("failed to install signal handlers")?;
        let report = run_interactive(
            provider,
            options.interactive_options(),
            &mut input,
            signals,
            &mut out,
            &mut err,
        )
        .await?;
        return Ok(report.all_succeeded());
    }

    let Some(config) = options.session_config() else {
        bail!("a prompt is required unless --interactive is given");
    };

    let stop = CancelHandle::new();
    let ctrl_c = tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Ctrl-C received, stopping after the current iteration");
                stop.cancel();
            }
        }
    });

    let report = run_loop(
        provider,
        &config,
        options.mode,
        &stop,
        divider_width,
        &mut out,
        &mut err,
    )
    .await;
    ctrl_c.abort();
    let report = report?;

    if options.mode != LoopMode::Single {
        writeln!(
            err,
            "{} iteration(s), {} failed",
            report.attempted, report.failed
        )?;
    }
    Ok(report.all_succeeded())
}
