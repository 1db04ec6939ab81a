use serde_json::Value;

use crate::render::detail_line;

/// Argument keys shown next to a tool name, most descriptive first.
const DETAIL_KEYS: [&str; 5] = ["file_path", "command", "description", "pattern", "query"];

/// Extract a one-line, redacted detail from a tool's accumulated JSON input.
///
/// Returns `None` when the input does not parse or carries none of the known
/// keys as a string.
pub fn extract_tool_detail(raw_input: &str) -> Option<String> {
    let input: Value = match serde_json::from_str(raw_input) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("[claude] tool input is not valid JSON: {}", err);
            return None;
        }
    };

    DETAIL_KEYS
        .iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .and_then(detail_line)
}
