//! Error type for provider operations and the vendor error classifier.
//!
//! Everything a vendor can throw at us ends up as a [`ProviderError`]. Before
//! it reaches the user it goes through [`classified_message`], which sorts it
//! into one of a few actionable buckets (auth, rate limit, connectivity) and
//! lets anything else pass through with its original wording.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Preconditions failed before any vendor call (CLI missing, no credentials).
    #[error("{0}")]
    Unavailable(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to {label}: {source}")]
    Io {
        label: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The vendor process exited without finishing the turn.
    #[error("{label} exited with {status}: {stderr}")]
    Exited {
        label: &'static str,
        status: String,
        stderr: String,
    },

    /// An error reported by the vendor itself, optionally with an HTTP status.
    #[error("{message}")]
    Vendor {
        message: String,
        status: Option<u16>,
    },

    #[error("{0}")]
    Protocol(String),

    #[error("Interrupted")]
    Cancelled,
}

impl ProviderError {
    pub fn vendor(message: impl Into<String>) -> Self {
        ProviderError::Vendor {
            message: message.into(),
            status: None,
        }
    }

    /// Returns the HTTP status code carried by this error, either explicitly or
    /// embedded in the message text ("status 429", "HTTP 401", ...).
    pub fn status_code(&self) -> Option<u16> {
        if let ProviderError::Vendor {
            status: Some(status),
            ..
        } = self
        {
            return Some(*status);
        }
        STATUS_HINT
            .captures(&self.to_string())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

static STATUS_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:status|http|code)[\s:=]*([1-5]\d\d)\b").expect("valid status regex")
});

/// Bucket a vendor error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Auth,
    RateLimit,
    Connectivity,
    Other,
}

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "invalid api key",
    "invalid x-api-key",
    "invalid_api_key",
    "authentication",
    "not logged in",
    "login required",
    "please run /login",
];

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota",
    "usage limit",
];

const CONNECTIVITY_MARKERS: &[&str] = &[
    "econnrefused",
    "econnreset",
    "enotfound",
    "etimedout",
    "eai_again",
    "connection refused",
    "connection reset",
    "connection closed",
    "stream disconnected",
    "network",
    "timed out",
    "dns",
    "unreachable",
];

/// Classify an error by status code first, then by well-known substrings.
pub fn classify(error: &ProviderError) -> ErrorClass {
    match error {
        // These already carry their own guidance.
        ProviderError::Unavailable(_)
        | ProviderError::UnknownProvider(_)
        | ProviderError::Spawn { .. }
        | ProviderError::Cancelled => return ErrorClass::Other,
        _ => {}
    }

    match error.status_code() {
        Some(401) | Some(403) => return ErrorClass::Auth,
        Some(429) => return ErrorClass::RateLimit,
        _ => {}
    }

    let text = error.to_string().to_lowercase();
    if AUTH_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorClass::Auth
    } else if RATE_LIMIT_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorClass::RateLimit
    } else if CONNECTIVITY_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorClass::Connectivity
    } else {
        ErrorClass::Other
    }
}

/// User-facing message for an error: classified buckets get remediation
/// guidance, everything else passes through unchanged.
pub fn classified_message(error: &ProviderError) -> String {
    let raw = error.to_string();
    match classify(error) {
        ErrorClass::Auth => format!(
            "Authentication failed. Log in with the vendor CLI (`claude /login`, `codex login`) \
             or set its API key, then retry. ({raw})"
        ),
        ErrorClass::RateLimit => format!(
            "Rate limit reached. Wait a moment before retrying, or run fewer iterations. ({raw})"
        ),
        ErrorClass::Connectivity => format!(
            "Could not reach the vendor service. Check your network connection or proxy settings. ({raw})"
        ),
        ErrorClass::Other => raw,
    }
}

/// [`classified_message`] for an error the vendor reported as plain text.
pub fn classify_vendor_message(message: &str) -> String {
    classified_message(&ProviderError::vendor(message))
}
