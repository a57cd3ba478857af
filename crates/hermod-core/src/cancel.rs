//! Cooperative cancellation (spec §5): closing a session stops its handler
//! without forcibly aborting the task running it.
//!
//! The corpus has no dependency on a cancellation-token crate, so this is a
//! small hand-rolled primitive built on a [`tokio::sync::watch`] channel:
//! cheap to clone, cheap to poll, and composes with `tokio::select!` the same
//! way a channel receiver does.

use tokio::sync::watch;

/// Observes whether cancellation has been requested.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Requests cancellation for every [`CancelToken`] cloned from the same
/// source.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Creates a linked source/token pair. Dropping the source without calling
/// [`CancelSource::cancel`] leaves the token permanently un-cancelled.
#[must_use]
pub fn cancel_pair() -> (CancelSource, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, CancelToken { rx })
}

impl CancelSource {
    /// Marks every linked [`CancelToken`] as cancelled. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. If it was already requested
    /// before this call, resolves immediately.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        // A closed sender (source dropped without cancelling) means this
        // future would otherwise hang forever; treat that as "never".
        while self.rx.changed().await.is_ok() {
            if self.is_cancelled() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}
