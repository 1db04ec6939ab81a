//! Multi-provider abstraction layer for AI coding CLIs.
//!
//! Each vendor CLI speaks its own streaming JSON dialect. The adapters in
//! [`claude`] and [`codex`] translate those into [`CanonicalEvent`]s so the
//! renderer and orchestrators never see vendor shapes.

mod errors;
mod runtime;
mod session;
pub mod stream;
pub(crate) mod types;
pub(crate) mod utils;

pub mod claude;
pub mod codex;

pub use errors::{classified_message, classify, classify_vendor_message, ErrorClass, ProviderError};
pub use runtime::CancelHandle;
pub use session::InteractiveSession;
pub use types::{
    failure_stream, BackendKind, CanonicalEvent, EventStream, InteractiveSessionConfig, Provider,
    ProviderRegistry, ProviderSessionConfig, SummaryInfo,
};
pub use utils::prepend_context;

