//! Core types and traits for the provider abstraction layer.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::errors::ProviderError;
use super::session::InteractiveSession;
use super::utils::prepend_context;

/// Identifies the vendor engine behind a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Claude,
    Codex,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Claude => write!(f, "claude"),
            BackendKind::Codex => write!(f, "codex"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(BackendKind::Claude),
            "codex" => Ok(BackendKind::Codex),
            _ => Err(ProviderError::UnknownProvider(s.to_string())),
        }
    }
}

/// Usage numbers attached to a successful turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub num_turns: u32,
    pub duration_ms: u64,
}

impl SummaryInfo {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Backend-neutral event produced by every vendor adapter.
///
/// This is the only vocabulary the renderer and the orchestrators speak. Each
/// turn's stream ends with exactly one `Result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    TextDelta {
        text: String,
    },
    ToolStart {
        name: String,
    },
    ToolEnd {
        name: String,
        detail: Option<String>,
    },
    Result {
        success: bool,
        summary: Option<SummaryInfo>,
        errors: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl CanonicalEvent {
    pub fn text(text: impl Into<String>) -> Self {
        CanonicalEvent::TextDelta { text: text.into() }
    }

    pub fn tool_start(name: impl Into<String>) -> Self {
        CanonicalEvent::ToolStart { name: name.into() }
    }

    pub fn tool_end(name: impl Into<String>, detail: Option<String>) -> Self {
        CanonicalEvent::ToolEnd {
            name: name.into(),
            detail,
        }
    }

    pub fn success(summary: SummaryInfo) -> Self {
        CanonicalEvent::Result {
            success: true,
            summary: Some(summary),
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        CanonicalEvent::Result {
            success: false,
            summary: None,
            errors,
        }
    }

    /// Zero-usage success emitted when a vendor stream ends without a
    /// terminal event of its own.
    pub fn synthetic_result() -> Self {
        Self::success(SummaryInfo::default())
    }

    pub fn is_result(&self) -> bool {
        matches!(self, CanonicalEvent::Result { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CanonicalEvent::Result { success: false, .. } | CanonicalEvent::Error { .. }
        )
    }
}

/// Lazy, single-consumer stream of canonical events for one run or turn.
pub type EventStream<'a> = BoxStream<'a, CanonicalEvent>;

/// A stream holding exactly one failure result.
pub fn failure_stream(message: impl Into<String>) -> EventStream<'static> {
    stream::iter(vec![CanonicalEvent::failure(vec![message.into()])]).boxed()
}

/// Configuration for a one-shot run.
#[derive(Debug, Clone, Default)]
pub struct ProviderSessionConfig {
    pub prompt: String,
    pub model: Option<String>,
    pub context: Vec<String>,
}

impl ProviderSessionConfig {
    /// The prompt with context references prepended.
    pub fn message(&self) -> String {
        prepend_context(&self.prompt, &self.context)
    }
}

/// Configuration for an interactive session. The prompt is sent per turn.
#[derive(Debug, Clone, Default)]
pub struct InteractiveSessionConfig {
    pub model: Option<String>,
    pub context: Vec<String>,
}

/// Trait for a provider implementation (e.g., Claude, Codex).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the kind of this provider.
    fn kind(&self) -> BackendKind;

    /// Human-readable provider name.
    fn name(&self) -> &'static str;

    /// Checks that the CLI is installed and credentials are present.
    fn preflight(&self) -> Result<(), ProviderError>;

    fn is_available(&self) -> bool {
        self.preflight().is_ok()
    }

    /// Short model aliases accepted on the command line.
    fn known_aliases(&self) -> HashMap<&'static str, &'static str>;

    /// Resolves a model alias to a model id.
    ///
    /// `None` (or blank) means "use the vendor default". Unknown values are
    /// taken to be full model ids and pass through unchanged.
    fn resolve_model(&self, alias: Option<&str>) -> Option<String> {
        let alias = alias.map(str::trim).filter(|a| !a.is_empty())?;
        let aliases = self.known_aliases();
        Some(
            aliases
                .get(alias.to_lowercase().as_str())
                .map(|model| model.to_string())
                .unwrap_or_else(|| alias.to_string()),
        )
    }

    /// Starts a one-shot run.
    async fn create_session(
        &self,
        config: ProviderSessionConfig,
    ) -> Result<EventStream<'static>, ProviderError>;

    /// Opens a persistent multi-turn session.
    async fn create_interactive_session(
        &self,
        config: InteractiveSessionConfig,
    ) -> Result<Box<dyn InteractiveSession>, ProviderError>;
}

/// Registry of available providers.
pub struct ProviderRegistry {
    providers: HashMap<BackendKind, Arc<dyn Provider>>,
    default: BackendKind,
}

impl ProviderRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default: BackendKind::Claude,
        }
    }

    /// Registers a provider.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Gets a provider by kind.
    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn Provider>> {
        self.providers.get(&kind).cloned()
    }

    /// Gets a provider by name, falling back to the default when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn Provider>, ProviderError> {
        let kind = match name {
            Some(name) => name.parse()?,
            None => self.default,
        };
        self.get(kind)
            .ok_or_else(|| ProviderError::UnknownProvider(kind.to_string()))
    }

    /// Sets the default provider kind.
    pub fn set_default(&mut self, kind: BackendKind) {
        self.default = kind;
    }

    /// Returns all registered provider kinds, sorted by name.
    pub fn available_backends(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.to_string());
        kinds
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
