//! Client-side route table and dispatch loop (spec §4.5).
//!
//! A router owns one [`Transport`] and multiplexes every frame it reads
//! back to the route that should see it: by endpoint ID is not needed
//! here (unlike the server, a client route already knows which endpoint it
//! opened), so frames are matched by `client_id` before a session ID is
//! known and by `session_id` after.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hermod_core::{CoreError, IdAllocator, Transport};
use hermod_proto::flags::AUTH_ENDPOINT;
use hermod_proto::Frame;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::route::{Readiness, RouteHandle};

/// Bound on a route's data/error queues.
const CHANNEL_CAPACITY: usize = 64;

/// Tunable timeouts for the router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// How long [`Router::open_route`]'s returned handle will wait for
    /// `ServerSessionAck` before failing with [`ClientError::Timeout`]
    /// (spec §4.5, the only protocol-level timeout).
    pub open_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { open_timeout: Duration::from_secs(10) }
    }
}

/// A newly created route: bookkeeping the router shares, plus the
/// channels the application reads from.
pub(crate) struct OpenedRoute {
    pub(crate) handle: Arc<RouteHandle>,
    pub(crate) ready: watch::Receiver<Readiness>,
    pub(crate) data: mpsc::Receiver<Bytes>,
    pub(crate) errors: mpsc::Receiver<String>,
}

struct PendingAuth {
    token: String,
    reply: oneshot::Sender<Result<(), String>>,
}

/// Multiplexes one transport's frames across many concurrently open routes.
pub struct Router {
    transport: Arc<dyn Transport>,
    config: RouterConfig,
    ids: Mutex<IdAllocator>,
    by_client: RwLock<HashMap<u32, Arc<RouteHandle>>>,
    by_session: RwLock<HashMap<u32, Arc<RouteHandle>>>,
    pending_auth: Mutex<Option<PendingAuth>>,
    auth_guard: Mutex<()>,
}

impl Router {
    /// Builds a router over `transport`. Call [`Router::run`] to start its
    /// read loop before opening any routes.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: RouterConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            config,
            ids: Mutex::new(IdAllocator::new()),
            by_client: RwLock::new(HashMap::new()),
            by_session: RwLock::new(HashMap::new()),
            pending_auth: Mutex::new(None),
            auth_guard: Mutex::new(()),
        })
    }

    /// Runs the read-dispatch loop until the transport closes or fails,
    /// releasing every route's resources on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Core`] if the transport read fails.
    pub async fn run(self: Arc<Self>) -> Result<(), ClientError> {
        loop {
            match self.transport.recv().await {
                Ok(Some(bytes)) => self.dispatch(bytes).await,
                Ok(None) => {
                    debug!("transport closed cleanly");
                    break;
                },
                Err(err) => {
                    warn!(error = %err, "transport read failed, tearing down routes");
                    self.shutdown("connection closed".to_string()).await;
                    return Err(err.into());
                },
            }
        }
        self.shutdown("connection closed".to_string()).await;
        Ok(())
    }

    /// Reserves a client ID and registers a new route for `endpoint_id`.
    /// Does not send the open request yet; that happens on first `open()`
    /// (spec §4.5's `ClientIDReserved` state).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::IdsExhausted`] if the client-ID space is full.
    pub(crate) async fn open_route(&self, endpoint_id: u16, token: Option<String>) -> Result<OpenedRoute, ClientError> {
        let client_id = self.ids.lock().await.allocate().ok_or(ClientError::IdsExhausted)?;
        let (data_tx, data_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (handle, ready) = RouteHandle::new(endpoint_id, client_id, token, data_tx, err_tx);
        let handle = Arc::new(handle);

        self.by_client.write().await.insert(client_id, Arc::clone(&handle));

        Ok(OpenedRoute { handle, ready, data: data_rx, errors: err_rx })
    }

    /// Sends the session-open request for `route` if it has not already
    /// been sent, then waits for the server's acknowledgement (or
    /// rejection, or the configured timeout).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`], [`ClientError::Server`] if the
    /// server rejected the request, or [`ClientError::Closed`] if the
    /// connection tore down first.
    pub(crate) async fn ensure_open(
        &self,
        handle: &Arc<RouteHandle>,
        ready: &mut watch::Receiver<Readiness>,
    ) -> Result<u32, ClientError> {
        handle.send_open_once(|| self.send_open_frame(handle)).await;

        let wait = async {
            loop {
                let current = ready.borrow().clone();
                match current {
                    Readiness::Ready(session_id) => return Ok(session_id),
                    Readiness::Failed(message) => return Err(ClientError::Server(message)),
                    Readiness::Pending => {
                        if ready.changed().await.is_err() {
                            return Err(ClientError::Closed);
                        }
                    },
                }
            }
        };

        match tokio::time::timeout(self.config.open_timeout, wait).await {
            Ok(result) => result,
            Err(_elapsed) => {
                self.abandon(handle.client_id).await;
                handle.mark_failed("session open timed out".to_string());
                Err(ClientError::Timeout)
            },
        }
    }

    /// Sends one `Data` frame for an already-open session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the transport write fails.
    pub(crate) async fn send_data(&self, endpoint_id: u16, session_id: u32, payload: Bytes) -> Result<(), CoreError> {
        self.send_frame(Frame::Data { endpoint_id, session_id, payload }).await
    }

    /// Sends `Close` for an open session and removes its route.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the transport write fails.
    pub(crate) async fn close_session(&self, endpoint_id: u16, session_id: u32) -> Result<(), CoreError> {
        self.by_session.write().await.remove(&session_id);
        self.send_frame(Frame::Close { endpoint_id, session_id }).await
    }

    /// Verifies `token` against the connection (spec §4.4, scenario 5).
    /// Serialized: only one `Authentication` exchange is in flight at a
    /// time, mirroring the per-route open lock's single-flight discipline.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] if the server's `AuthenticationAck`
    /// hash does not match, or the connection closed before a reply arrived.
    pub async fn authenticate(&self, token: String) -> Result<(), ClientError> {
        let _guard = self.auth_guard.lock().await;
        let (reply, rx) = oneshot::channel();
        *self.pending_auth.lock().await = Some(PendingAuth { token: token.clone(), reply });
        self.send_frame(Frame::Authentication { token }).await?;

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(ClientError::Server(message)),
            Err(_) => Err(ClientError::Closed),
        }
    }

    async fn send_open_frame(&self, handle: &RouteHandle) {
        let frame = match &handle.token {
            Some(token) => Frame::ClientSessionRequestWithAuth {
                endpoint_id: handle.endpoint_id,
                client_id: handle.client_id,
                token: token.clone(),
            },
            None => Frame::ClientSessionRequest { endpoint_id: handle.endpoint_id, client_id: handle.client_id },
        };
        if let Err(err) = self.send_frame(frame).await {
            warn!(client_id = handle.client_id, error = %err, "failed to send session-open request");
            handle.mark_failed(err.to_string());
        }
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), CoreError> {
        self.transport.send(Bytes::from(frame.encode())).await
    }

    async fn abandon(&self, client_id: u32) {
        if self.by_client.write().await.remove(&client_id).is_some() {
            self.ids.lock().await.release(client_id);
        }
    }

    async fn dispatch(&self, bytes: Bytes) {
        let frame = match Frame::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping unparsable frame");
                return;
            },
        };

        match frame {
            Frame::ServerSessionAck { client_id, session_id, .. } => self.on_ack(client_id, session_id).await,
            Frame::ErrorClientID { endpoint_id, message, .. } if endpoint_id == AUTH_ENDPOINT => {
                self.resolve_auth(Err(message)).await;
            },
            Frame::ErrorClientID { client_id, message, .. } => self.on_client_error(client_id, message).await,
            Frame::Data { session_id, payload, .. } => self.on_data(session_id, payload).await,
            Frame::Close { session_id, .. } => self.on_close(session_id).await,
            Frame::ErrorSessionID { session_id, message, .. } => self.on_session_error(session_id, message).await,
            Frame::AuthenticationAck { token_hash } => self.on_auth_ack(token_hash).await,
            Frame::ClientSessionRequest { .. } | Frame::ClientSessionRequestWithAuth { .. } | Frame::Authentication { .. } => {
                debug!("ignoring server-bound frame received on the client side");
            },
        }
    }

    async fn on_ack(&self, client_id: u32, session_id: u32) {
        let route = self.by_client.write().await.remove(&client_id);
        let Some(route) = route else {
            warn!(client_id, "ack for unknown client id");
            return;
        };
        self.ids.lock().await.release(client_id);
        self.by_session.write().await.insert(session_id, Arc::clone(&route));
        route.mark_ready(session_id);
    }

    async fn on_client_error(&self, client_id: u32, message: String) {
        if let Some(route) = self.by_client.write().await.remove(&client_id) {
            self.ids.lock().await.release(client_id);
            route.mark_failed(message);
        } else {
            warn!(client_id, message, "error for unknown client id");
        }
    }

    async fn on_data(&self, session_id: u32, payload: Bytes) {
        if payload.is_empty() {
            warn!(session_id, "dropping malformed zero-length data payload");
            return;
        }
        let route = self.by_session.read().await.get(&session_id).cloned();
        match route {
            Some(route) => {
                route.push_data(payload).await;
            },
            None => warn!(session_id, "data for unknown or not-yet-open session"),
        }
    }

    async fn on_close(&self, session_id: u32) {
        if let Some(route) = self.by_session.write().await.remove(&session_id) {
            route.close_channels().await;
        }
    }

    async fn on_session_error(&self, session_id: u32, message: String) {
        let route = self.by_session.read().await.get(&session_id).cloned();
        match route {
            Some(route) => {
                route.push_error(message).await;
            },
            None => warn!(session_id, message, "error for unknown session"),
        }
    }

    async fn on_auth_ack(&self, token_hash: [u8; 32]) {
        let pending = self.pending_auth.lock().await.take();
        let Some(pending) = pending else {
            warn!("unexpected AuthenticationAck with no pending request");
            return;
        };
        let expected: [u8; 32] = Sha256::digest(pending.token.as_bytes()).into();
        let result = if expected == token_hash { Ok(()) } else { Err("token hash mismatch".to_string()) };
        let _ = pending.reply.send(result);
    }

    async fn resolve_auth(&self, result: Result<(), String>) {
        if let Some(pending) = self.pending_auth.lock().await.take() {
            let _ = pending.reply.send(result);
        }
    }

    async fn shutdown(&self, reason: String) {
        for (_, route) in self.by_client.write().await.drain() {
            route.mark_failed(reason.clone());
            route.close_channels().await;
        }
        for (_, route) in self.by_session.write().await.drain() {
            route.close_channels().await;
        }
        self.resolve_auth(Err(reason)).await;
    }
}

#[cfg(test)]
mod tests {
    use hermod_core::transport::test_support::ChannelTransport;

    use super::*;

    #[tokio::test]
    async fn open_route_allocates_increasing_client_ids() {
        let (transport, _peer) = ChannelTransport::pair();
        let router = Router::new(Arc::new(transport), RouterConfig::default());

        let first = router.open_route(10, None).await.unwrap();
        let second = router.open_route(10, None).await.unwrap();
        assert_eq!(first.handle.client_id, 0);
        assert_eq!(second.handle.client_id, 1);
    }

    #[tokio::test]
    async fn ack_moves_a_route_from_client_id_to_session_id() {
        let (transport, peer) = ChannelTransport::pair();
        let router = Router::new(Arc::new(transport), RouterConfig::default());

        let mut opened = router.open_route(10, None).await.unwrap();
        router.send_open_frame(&opened.handle).await;
        let sent = peer.recv().await.unwrap().unwrap();
        assert_eq!(
            Frame::decode(&sent).unwrap(),
            Frame::ClientSessionRequest { endpoint_id: 10, client_id: 0 }
        );

        router.dispatch(Bytes::from(Frame::ServerSessionAck { endpoint_id: 10, client_id: 0, session_id: 5 }.encode())).await;

        assert!(router.by_client.read().await.is_empty());
        assert!(router.by_session.read().await.contains_key(&5));
        opened.ready.changed().await.unwrap();
        assert_eq!(*opened.ready.borrow(), Readiness::Ready(5));
    }

    #[tokio::test]
    async fn data_for_open_session_reaches_the_route() {
        let (transport, _peer) = ChannelTransport::pair();
        let router = Router::new(Arc::new(transport), RouterConfig::default());

        let mut opened = router.open_route(10, None).await.unwrap();
        router.dispatch(Bytes::from(Frame::ServerSessionAck { endpoint_id: 10, client_id: 0, session_id: 5 }.encode())).await;
        router.dispatch(Bytes::from(Frame::Data { endpoint_id: 10, session_id: 5, payload: Bytes::from_static(b"hi") }.encode())).await;

        assert_eq!(opened.data.recv().await, Some(Bytes::from_static(b"hi")));
    }

    #[tokio::test]
    async fn close_ends_the_data_stream() {
        let (transport, _peer) = ChannelTransport::pair();
        let router = Router::new(Arc::new(transport), RouterConfig::default());

        let mut opened = router.open_route(10, None).await.unwrap();
        router.dispatch(Bytes::from(Frame::ServerSessionAck { endpoint_id: 10, client_id: 0, session_id: 5 }.encode())).await;
        router.dispatch(Bytes::from(Frame::Close { endpoint_id: 10, session_id: 5 }.encode())).await;

        assert_eq!(opened.data.recv().await, None);
    }
}
