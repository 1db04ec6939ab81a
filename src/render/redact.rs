//! Secret scrubbing for text shown next to tool invocations.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Leading `VAR=value` assignments on a line, optionally after `export `.
static LEADING_ASSIGNMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^([ \t]*(?:export[ \t]+)?)((?:[A-Za-z_][A-Za-z0-9_]*=(?:"[^"\n]*"|'[^'\n]*'|\S*)(?:[ \t]+|$))+)"#,
    )
    .expect("valid assignment regex")
});

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)=(?:"[^"\n]*"|'[^'\n]*'|\S*)"#)
        .expect("valid assignment regex")
});

static BEARER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(authorization:\s*bearer\s+)[^\s"']+"#).expect("valid bearer regex")
});

/// Masks shell variable assignments at the start of a line and bearer
/// tokens in `Authorization` headers. Everything else is left alone.
pub fn redact_secrets(text: &str) -> String {
    let masked = LEADING_ASSIGNMENTS.replace_all(text, |caps: &Captures| {
        format!(
            "{}{}",
            &caps[1],
            ASSIGNMENT.replace_all(&caps[2], "${1}=***")
        )
    });
    BEARER.replace_all(&masked, "${1}***").into_owned()
}

/// First non-empty-trimmed line of `text`, redacted; `None` if there is nothing to show.
pub fn detail_line(text: &str) -> Option<String> {
    let first = text.lines().next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(redact_secrets(first))
}
