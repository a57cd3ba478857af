//! Client-side route state machine (spec §3, §4.5).
//!
//! ```text
//! Initial ── Init() ──► ClientIDReserved
//!                        │
//!                      Messages()/Send() begins dispatch:
//!                      send ClientSessionRequest (once, guarded by a lock)
//!                        │
//!                        ▼
//!                     AwaitingAck
//!                        │
//!                      ServerSessionAck → record session_id, release client_id, signal ready
//!                        │
//!                        ▼
//!                       Open ── Send / receive loop
//!                        │
//!                      Close / Cancel / ErrorSessionID
//!                        ▼
//!                      Closed
//! ```

use bytes::Bytes;
use tokio::sync::{mpsc, watch, Mutex};

/// What a route's open handshake has produced so far.
///
/// Carried over a [`watch`] channel so every caller blocked on `open()`
/// (spec §4.5: "subsequent concurrent callers block until the single
/// in-flight open completes") observes the same outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// No `ServerSessionAck` or error has arrived yet.
    Pending,
    /// Acknowledged; carries the assigned session ID.
    Ready(u32),
    /// The open request failed (`ErrorClientID`), timed out, or the
    /// connection closed first.
    Failed(String),
}

/// Router-side bookkeeping for one route (spec §3's `Route`).
///
/// `client_id` is the correlation key until `ServerSessionAck` arrives;
/// `session_id` is unknown until then, carried instead in [`Readiness`].
/// The data/error senders live behind their own mutex so the router can
/// explicitly close them (signalling end-of-stream to the application's
/// receivers) without needing to be the sole owner of this handle — the
/// application's [`crate::readwriter::ServiceReadWriter`] holds a clone of
/// the same `Arc<RouteHandle>` for the route's whole lifetime.
pub(crate) struct RouteHandle {
    pub(crate) endpoint_id: u16,
    pub(crate) client_id: u32,
    pub(crate) token: Option<String>,
    ready: watch::Sender<Readiness>,
    data: Mutex<Option<mpsc::Sender<Bytes>>>,
    errors: Mutex<Option<mpsc::Sender<String>>>,
    /// Guards the single in-flight open-request send: `true` once the
    /// request has been written to the transport, checked-and-set while
    /// holding the lock so concurrent openers never double-send.
    open_sent: Mutex<bool>,
}

impl RouteHandle {
    /// Builds a route in the `ClientIDReserved` state.
    pub(crate) fn new(
        endpoint_id: u16,
        client_id: u32,
        token: Option<String>,
        data: mpsc::Sender<Bytes>,
        errors: mpsc::Sender<String>,
    ) -> (Self, watch::Receiver<Readiness>) {
        let (ready, rx) = watch::channel(Readiness::Pending);
        (
            Self {
                endpoint_id,
                client_id,
                token,
                ready,
                data: Mutex::new(Some(data)),
                errors: Mutex::new(Some(errors)),
                open_sent: Mutex::new(false),
            },
            rx,
        )
    }

    /// Runs `send_request` at most once across every caller racing to open
    /// this route. Callers that lose the race simply wait for the winner's
    /// send to land before returning.
    pub(crate) async fn send_open_once<F, Fut>(&self, send_request: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut sent = self.open_sent.lock().await;
        if !*sent {
            send_request().await;
            *sent = true;
        }
    }

    /// Records the server's acknowledgement, unblocking every waiter.
    pub(crate) fn mark_ready(&self, session_id: u32) {
        let _ = self.ready.send(Readiness::Ready(session_id));
    }

    /// Records a terminal failure (rejection, timeout, or connection
    /// teardown), unblocking every waiter with an error instead of a
    /// session ID.
    pub(crate) fn mark_failed(&self, message: String) {
        let _ = self.ready.send(Readiness::Failed(message));
    }

    /// Delivers a `Data` payload to the route's consumer. Returns `false`
    /// if the channel has been closed (route closed, or never opened for
    /// data — e.g. the open handshake failed).
    pub(crate) async fn push_data(&self, payload: Bytes) -> bool {
        match self.data.lock().await.as_ref() {
            Some(sender) => sender.send(payload).await.is_ok(),
            None => false,
        }
    }

    /// Delivers an out-of-band error to the route's consumer, on the
    /// dedicated error channel distinct from data (spec §7).
    pub(crate) async fn push_error(&self, message: String) -> bool {
        match self.errors.lock().await.as_ref() {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }

    /// Closes both channels, causing the consumer's receivers to drain and
    /// then yield `None` — the application-visible end-of-stream signal.
    pub(crate) async fn close_channels(&self) {
        *self.data.lock().await = None;
        *self.errors.lock().await = None;
    }
}
