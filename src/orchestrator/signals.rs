//! Signal interception scoped to the interactive REPL.

use futures::future::{BoxFuture, FutureExt};
use std::io;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A named future that resolves when the signal arrives.
pub type SignalSource = (&'static str, BoxFuture<'static, ()>);

/// Watcher tasks for a set of signal sources.
///
/// Each watcher calls `on_signal` once with the source name. Watchers stop
/// when the guard is removed or dropped.
pub struct SignalGuard {
    watchers: Vec<JoinHandle<()>>,
}

impl SignalGuard {
    pub fn install<F>(sources: Vec<SignalSource>, on_signal: F) -> Self
    where
        F: Fn(&'static str) + Send + Sync + 'static,
    {
        let on_signal = Arc::new(on_signal);
        let watchers = sources
            .into_iter()
            .map(|(name, signal)| {
                let on_signal = on_signal.clone();
                tokio::spawn(async move {
                    signal.await;
                    log::info!("Received {}", name);
                    on_signal(name);
                })
            })
            .collect();
        Self { watchers }
    }

    /// Stops every watcher and waits for them to go away.
    pub async fn remove(mut self) {
        for watcher in std::mem::take(&mut self.watchers) {
            watcher.abort();
            let _ = watcher.await;
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

/// SIGINT and SIGTERM as signal sources. Must be called inside a runtime.
#[cfg(unix)]
pub fn os_signals() -> io::Result<Vec<SignalSource>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(vec![
        (
            "SIGINT",
            async move {
                interrupt.recv().await;
            }
            .boxed(),
        ),
        (
            "SIGTERM",
            async move {
                terminate.recv().await;
            }
            .boxed(),
        ),
    ])
}

#[cfg(not(unix))]
pub fn os_signals() -> io::Result<Vec<SignalSource>> {
    Ok(vec![(
        "Ctrl-C",
        async {
            let _ = tokio::signal::ctrl_c().await;
        }
        .boxed(),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn source(name: &'static str) -> (oneshot::Sender<()>, SignalSource) {
        let (tx, rx) = oneshot::channel();
        let fut = async move {
            let _ = rx.await;
        }
        .boxed();
        (tx, (name, fut))
    }

    #[tokio::test]
    async fn fired_signal_reaches_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (int_tx, int_source) = source("SIGINT");
        let (_term_tx, term_source) = source("SIGTERM");

        let guard = SignalGuard::install(vec![int_source, term_source], {
            let seen = seen.clone();
            move |name| seen.lock().push(name)
        });

        int_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while seen.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("callback should run");

        guard.remove().await;
        assert_eq!(*seen.lock(), vec!["SIGINT"]);
    }

    #[tokio::test]
    async fn removal_drops_watchers() {
        let (int_tx, int_source) = source("SIGINT");
        let guard = SignalGuard::install(vec![int_source], |_| {});
        assert!(!int_tx.is_closed());
        guard.remove().await;
        assert!(int_tx.is_closed());
    }
}
