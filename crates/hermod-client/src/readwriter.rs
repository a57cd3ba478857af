//! The application-facing handle for one open route (spec §3, §4.5).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::error::ClientError;
use crate::route::{Readiness, RouteHandle};
use crate::router::Router;

/// A single request/response session multiplexed over a [`Router`]'s
/// transport.
///
/// Opening is lazy: the handle is created in the `ClientIDReserved` state
/// and the actual `ClientSessionRequest` is sent on the first call that
/// needs the session open (spec §4.5). Every such call shares the same
/// in-flight open if one is already running.
pub struct ServiceReadWriter {
    router: Arc<Router>,
    handle: Arc<RouteHandle>,
    ready: watch::Receiver<Readiness>,
    data: mpsc::Receiver<Bytes>,
    errors: mpsc::Receiver<String>,
    open_timeout: Duration,
    session_id: Option<u32>,
}

impl ServiceReadWriter {
    pub(crate) fn new(
        router: Arc<Router>,
        handle: Arc<RouteHandle>,
        ready: watch::Receiver<Readiness>,
        data: mpsc::Receiver<Bytes>,
        errors: mpsc::Receiver<String>,
        open_timeout: Duration,
    ) -> Self {
        Self { router, handle, ready, data, errors, open_timeout, session_id: None }
    }

    /// Ensures the session is open, waiting on the handshake if necessary.
    /// Called implicitly by [`Self::send`] and [`Self::recv`]; exposed so
    /// callers that only want to observe the handshake outcome can do so
    /// without sending anything.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] if the server does not acknowledge
    /// within the router's configured timeout, or [`ClientError::Server`]
    /// if it rejects the request.
    pub async fn open(&mut self) -> Result<u32, ClientError> {
        if let Some(session_id) = self.session_id {
            return Ok(session_id);
        }
        let session_id = self.router.ensure_open(&self.handle, &mut self.ready).await?;
        self.session_id = Some(session_id);
        Ok(session_id)
    }

    /// Sends one payload, opening the session first if needed.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::open`]'s errors, or [`ClientError::Core`] if the
    /// transport write fails.
    pub async fn send(&mut self, payload: Bytes) -> Result<(), ClientError> {
        let session_id = self.open().await?;
        self.router.send_data(self.handle.endpoint_id, session_id, payload).await?;
        Ok(())
    }

    /// Receives the next data payload, or `None` once the session has
    /// closed and every buffered payload has been drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.data.recv().await
    }

    /// Receives the next out-of-band error for this session, on the
    /// channel distinct from data (spec §7).
    pub async fn recv_error(&mut self) -> Option<String> {
        self.errors.recv().await
    }

    /// Closes the session. A no-op if it never finished opening.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Core`] if the transport write fails.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if let Some(session_id) = self.session_id.take() {
            self.router.close_session(self.handle.endpoint_id, session_id).await?;
        }
        self.handle.close_channels().await;
        Ok(())
    }

    /// The configured open-handshake timeout, for diagnostics.
    #[must_use]
    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }
}
