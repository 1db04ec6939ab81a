//! Checks against the real vendor CLIs.
//!
//! Every stdout line the CLIs produce must deserialize into our wire types,
//! and a full run through each provider must end with exactly one `Result`.
//!
//! All tests are `#[ignore]`: they need the `claude` / `codex` CLIs installed
//! and logged in, and they cost real API tokens.
//!
//! Run with:
//! ```bash
//! cargo test --test cli_verify -- --ignored --nocapture --test-threads=1
//! ```

use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use polyagent::backends::claude::cli_protocol::CliEvent;
use polyagent::backends::claude::ClaudeProvider;
use polyagent::backends::codex::events::CodexEvent;
use polyagent::backends::codex::CodexProvider;
use polyagent::backends::{CanonicalEvent, Provider, ProviderSessionConfig};

const TIMEOUT: Duration = Duration::from_secs(180);

/// Spawns `cmd`, optionally feeds `stdin`, and returns the lines that fail to
/// deserialize as `T` along with the total line count.
async fn undecodable_lines<T: DeserializeOwned>(
    mut cmd: Command,
    stdin: Option<String>,
) -> (Vec<String>, usize) {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    let mut child = cmd.spawn().expect("failed to spawn CLI, is it installed?");

    let mut pipe = child.stdin.take().expect("stdin");
    if let Some(input) = stdin {
        pipe.write_all(input.as_bytes()).await.unwrap();
        pipe.write_all(b"\n").await.unwrap();
        pipe.flush().await.unwrap();
    }
    drop(pipe);

    let mut lines = BufReader::new(child.stdout.take().expect("stdout")).lines();
    let mut bad = Vec::new();
    let mut total = 0;
    tokio::time::timeout(TIMEOUT, async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.trim().is_empty() {
                continue;
            }
            total += 1;
            if let Err(err) = serde_json::from_str::<T>(&line) {
                bad.push(format!("{err}: {line}"));
            }
        }
    })
    .await
    .expect("CLI did not finish in time");
    let _ = child.wait().await;
    (bad, total)
}

async fn collect_run(provider: &dyn Provider, prompt: &str) -> Vec<CanonicalEvent> {
    let config = ProviderSessionConfig {
        prompt: prompt.to_string(),
        ..Default::default()
    };
    let events = provider
        .create_session(config)
        .await
        .expect("session should start");
    tokio::time::timeout(TIMEOUT, events.collect())
        .await
        .expect("run did not finish in time")
}

fn assert_single_trailing_result(events: &[CanonicalEvent]) {
    for event in events {
        eprintln!("  {:?}", event);
    }
    assert_eq!(events.iter().filter(|e| e.is_result()).count(), 1);
    assert!(events.last().map(|e| e.is_result()).unwrap_or(false));
}

#[tokio::test]
#[ignore]
async fn claude_stream_json_lines_all_decode() {
    let mut cmd = Command::new("claude");
    cmd.args([
        "-p",
        "--output-format",
        "stream-json",
        "--verbose",
        "--input-format",
        "stream-json",
        "--include-partial-messages",
        "--model",
        "haiku",
    ]);
    let user = serde_json::json!({
        "type": "user",
        "message": {"role": "user", "content": "Reply with the single word: pong"}
    });

    let (bad, total) = undecodable_lines::<CliEvent>(cmd, Some(user.to_string())).await;
    assert!(total > 0, "no output from claude");
    assert!(bad.is_empty(), "undecodable lines:\n{}", bad.join("\n"));
}

#[tokio::test]
#[ignore]
async fn codex_exec_json_lines_all_decode() {
    let mut cmd = Command::new("codex");
    cmd.args([
        "exec",
        "--json",
        "--skip-git-repo-check",
        "Reply with the single word: pong",
    ]);

    let (bad, total) = undecodable_lines::<CodexEvent>(cmd, None).await;
    assert!(total > 0, "no output from codex");
    assert!(bad.is_empty(), "undecodable lines:\n{}", bad.join("\n"));
}

#[tokio::test]
#[ignore]
async fn claude_run_ends_with_one_result() {
    let events = collect_run(&ClaudeProvider::default(), "Reply with the single word: pong").await;
    assert_single_trailing_result(&events);
    assert!(events.iter().any(|e| matches!(e, CanonicalEvent::TextDelta { .. })));
}

#[tokio::test]
#[ignore]
async fn codex_run_ends_with_one_result() {
    let events = collect_run(&CodexProvider::default(), "Reply with the single word: pong").await;
    assert_single_trailing_result(&events);
    assert!(events.iter().any(|e| matches!(e, CanonicalEvent::TextDelta { .. })));
}
