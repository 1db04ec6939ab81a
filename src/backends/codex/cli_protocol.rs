use serde_json::Value;

use crate::config::VendorSettings;

/// Extracts the thread id from a raw `thread.started` line.
pub fn thread_id_from_line(line: &str) -> Option<String> {
    if !line.contains("thread.started") {
        return None;
    }
    let value: Value = serde_json::from_str(line).ok()?;
    if value.get("type").and_then(Value::as_str) != Some("thread.started") {
        return None;
    }
    value
        .get("thread_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Arguments for `codex exec`, continuing `thread_id` when given.
pub fn exec_args(
    settings: &VendorSettings,
    model: Option<&str>,
    thread_id: Option<&str>,
    prompt: &str,
) -> Vec<String> {
    let mut args = vec![
        "exec".to_string(),
        "--json".to_string(),
        "--skip-git-repo-check".to_string(),
    ];
    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    if let Some(sandbox) = settings.sandbox.as_deref() {
        args.push("--sandbox".to_string());
        args.push(sandbox.to_string());
    }
    args.extend(settings.extra_args.iter().cloned());
    if let Some(thread_id) = thread_id {
        args.push("resume".to_string());
        args.push(thread_id.to_string());
    }
    args.push("--".to_string());
    args.push(prompt.to_string());
    args
}
