//! Session trait for persistent, multi-turn vendor conversations.

use async_trait::async_trait;

use super::errors::ProviderError;
use super::runtime::CancelHandle;
use super::types::{BackendKind, EventStream};

/// Trait for an interactive session.
///
/// A session keeps whatever the vendor needs to continue a conversation (a
/// live process, a thread id) so the caller never resends history. Each turn
/// is `send` followed by draining `stream` until it ends.
#[async_trait]
pub trait InteractiveSession: Send {
    /// Returns the backend kind.
    fn backend_kind(&self) -> BackendKind;

    /// Starts a turn with the given user text.
    async fn send(&mut self, text: &str) -> Result<(), ProviderError>;

    /// Canonical events for the turn started by the last `send`.
    ///
    /// The stream ends after the turn's terminal `Result`. Calling it without
    /// a pending turn yields an empty stream.
    fn stream(&mut self) -> EventStream<'_>;

    /// Releases the vendor handle. Safe to call more than once.
    async fn close(&mut self);

    /// Handle that force-releases the vendor side from another task, if the
    /// vendor has something to release.
    fn abort_handle(&self) -> Option<CancelHandle> {
        None
    }
}
