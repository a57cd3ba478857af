//! Endpoint handler contract (spec §4.5).
//!
//! [`Endpoint`] is a hand-written async trait following the same
//! blanket-impl-for-`Fn` shape as [`hermod_core::auth::Hydrator`], so a
//! plain `async fn(HandlerContext<H>, ResponseSink) -> Result<(), HandlerError>`
//! can be registered directly without a wrapper type.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use hermod_core::{AuthProvider, CancelToken, CoreError, Transport};
use hermod_proto::Frame;
use tokio::sync::mpsc;

use crate::error::HandlerError;

/// Payload queue a handler reads from, in the order the transport
/// delivered them (spec §5's per-session ordering guarantee).
pub type Inbound = mpsc::Receiver<Bytes>;

/// Everything a handler needs to service one session (spec §4.5's
/// `{context, inbound, headers, auth}`).
pub struct HandlerContext<H> {
    /// The endpoint this session was opened against.
    pub endpoint_id: u16,
    /// This session's ID, assigned by the multiplexer.
    pub session_id: u32,
    /// Payload queue, closed when the session ends.
    pub inbound: Inbound,
    /// Connection-level metadata (e.g. headers captured at transport
    /// upgrade). Empty unless the concrete transport populates it.
    pub headers: Arc<HashMap<String, String>>,
    /// The session's auth provider: the per-session one if
    /// `ClientSessionRequestWithAuth` supplied a token, else the
    /// connection-scoped one, else `None`.
    pub auth: Option<Arc<AuthProvider<H>>>,
    /// Fires when the session is cancelled from outside the handler (peer
    /// `Close`, or connection teardown). Handlers blocked on something
    /// other than `inbound` should race this in a `select!`.
    pub cancel: CancelToken,
}

/// Sends payloads and errors back to the peer for one session.
///
/// Cloning is cheap: every clone shares the same underlying transport,
/// which is itself responsible for serializing concurrent writes (spec
/// §5's "writes to the transport are serialized").
#[derive(Clone)]
pub struct ResponseSink {
    endpoint_id: u16,
    session_id: u32,
    transport: Arc<dyn Transport>,
}

impl ResponseSink {
    pub(crate) fn new(endpoint_id: u16, session_id: u32, transport: Arc<dyn Transport>) -> Self {
        Self { endpoint_id, session_id, transport }
    }

    /// Sends one payload as a `Data` frame for this session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the underlying transport write fails.
    pub async fn send(&self, payload: Bytes) -> Result<(), CoreError> {
        let frame = Frame::Data { endpoint_id: self.endpoint_id, session_id: self.session_id, payload };
        self.transport.send(Bytes::from(frame.encode())).await
    }

    /// Sends an out-of-band `ErrorSessionID` for this session without
    /// closing it. Distinct from returning `Err` from the handler, which
    /// closes the session after the error is sent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the underlying transport write fails.
    pub async fn send_error(&self, message: impl Into<String>) -> Result<(), CoreError> {
        let frame =
            Frame::ErrorSessionID { endpoint_id: self.endpoint_id, session_id: self.session_id, message: message.into() };
        self.transport.send(Bytes::from(frame.encode())).await
    }

    pub(crate) async fn send_close(&self) -> Result<(), CoreError> {
        let frame = Frame::Close { endpoint_id: self.endpoint_id, session_id: self.session_id };
        self.transport.send(Bytes::from(frame.encode())).await
    }
}

/// A handler bound to a registered endpoint.
///
/// Implemented for any `Fn(HandlerContext<H>, ResponseSink) -> Fut` where
/// `Fut: Future<Output = Result<(), HandlerError>>`, so ordinary async
/// functions and closures register directly.
pub trait Endpoint<H>: Send + Sync {
    /// Services one session end to end. The multiplexer closes the session
    /// and notifies the peer once this resolves, regardless of outcome.
    fn call<'a>(
        &'a self,
        ctx: HandlerContext<H>,
        sink: ResponseSink,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;
}

impl<H, F, Fut> Endpoint<H> for F
where
    F: Fn(HandlerContext<H>, ResponseSink) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: HandlerContext<H>,
        sink: ResponseSink,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(self(ctx, sink))
    }
}
