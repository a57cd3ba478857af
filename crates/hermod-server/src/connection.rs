//! Per-connection dispatch loop and session lifecycle (spec §4.5, §5).
//!
//! ```text
//!          new      ClientSessionRequest / ack with new session_id
//! none ─────────────────────────────────────────────► Open
//!                                                      │
//!                                 Data                 │ (loop, handler sees payloads)
//!                                                      │
//!                                           Close / handler exit
//!                                                      ▼
//!                                                   Closed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use hermod_core::{AuthConfig, AuthProvider, Transport};
use hermod_proto::flags::AUTH_ENDPOINT;
use hermod_proto::Frame;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::handler::{HandlerContext, ResponseSink};
use crate::registry::EndpointRegistry;
use crate::session::SessionTable;

/// Per-connection settings that do not vary across sessions.
#[derive(Default)]
pub struct ConnectionConfig {
    /// Metadata captured at transport upgrade (e.g. HTTP headers), handed
    /// to every handler on this connection unchanged.
    pub headers: HashMap<String, String>,
}

/// Drives one physical connection: reads frames, maintains the session
/// table, and dispatches to registered endpoint handlers.
pub struct Connection<H> {
    transport: Arc<dyn Transport>,
    endpoints: Arc<EndpointRegistry<H>>,
    sessions: Arc<SessionTable<H>>,
    auth_config: Option<Arc<AuthConfig<H>>>,
    conn_auth: Option<Arc<AuthProvider<H>>>,
    headers: Arc<HashMap<String, String>>,
}

impl<H> Connection<H>
where
    H: Clone + Send + Sync + 'static,
{
    /// Builds a connection bound to `transport`. If `auth_config` is
    /// supplied, an (initially empty) connection-scoped auth provider is
    /// created up front so `Authentication` frames and query-string
    /// verification have somewhere to land.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Arc<EndpointRegistry<H>>,
        auth_config: Option<Arc<AuthConfig<H>>>,
        config: ConnectionConfig,
    ) -> Self {
        let conn_auth = auth_config.as_ref().map(|c| Arc::new(AuthProvider::new(Arc::clone(c))));
        Self {
            transport,
            endpoints,
            sessions: Arc::new(SessionTable::new()),
            auth_config,
            conn_auth,
            headers: Arc::new(config.headers),
        }
    }

    /// Verifies a transport-upgrade query-string token before any frames
    /// are processed (spec §6). A failure here is a transport-level
    /// rejection, distinct from an in-band `Authentication` frame failure:
    /// callers should close the connection rather than continue the loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::AuthNotConfigured`] if no
    /// [`AuthConfig`] was supplied, or [`ConnectionError::Auth`] if the
    /// token fails verification.
    pub async fn authenticate_connection(&self, token: &str) -> Result<(), ConnectionError> {
        let provider = self.conn_auth.as_ref().ok_or(ConnectionError::AuthNotConfigured)?;
        provider.update(token).await?;
        Ok(())
    }

    /// Runs the read-dispatch loop until the peer closes cleanly or the
    /// transport fails. Frame-level errors addressed to a single client or
    /// session are handled in-band and do not end the loop; transport
    /// failures do (spec §7).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Core`] if the transport read or a reply
    /// write fails.
    pub async fn run(self: Arc<Self>) -> Result<(), ConnectionError> {
        loop {
            let message = match self.transport.recv().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!("peer closed the connection");
                    break;
                },
                Err(err) => {
                    warn!(error = %err, "transport read failed, terminating connection");
                    return Err(err.into());
                },
            };

            if let Err(err) = self.dispatch(message).await {
                warn!(error = %err, "terminating connection after dispatch failure");
                return Err(err);
            }
        }
        Ok(())
    }

    async fn dispatch(&self, bytes: Bytes) -> Result<(), ConnectionError> {
        let frame = match Frame::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping unparsable frame");
                return Ok(());
            },
        };

        match frame {
            Frame::ClientSessionRequest { endpoint_id, client_id } => {
                self.open_session(endpoint_id, client_id, None).await
            },
            Frame::ClientSessionRequestWithAuth { endpoint_id, client_id, token } => {
                self.open_session(endpoint_id, client_id, Some(token)).await
            },
            Frame::Data { endpoint_id, session_id, payload } => self.on_data(endpoint_id, session_id, payload).await,
            Frame::Close { session_id, .. } => {
                self.sessions.close(session_id).await;
                Ok(())
            },
            Frame::Authentication { token } => self.on_authentication(token).await,
            Frame::ServerSessionAck { .. }
            | Frame::ErrorClientID { .. }
            | Frame::ErrorSessionID { .. }
            | Frame::AuthenticationAck { .. } => {
                debug!("ignoring client-bound frame received on the server side");
                Ok(())
            },
        }
    }

    async fn open_session(
        &self,
        endpoint_id: u16,
        client_id: u32,
        token: Option<String>,
    ) -> Result<(), ConnectionError> {
        let Some(handler) = self.endpoints.get(endpoint_id) else {
            return self
                .send_frame(Frame::ErrorClientID {
                    endpoint_id,
                    client_id,
                    message: format!("endpoint {endpoint_id} not found"),
                })
                .await;
        };

        let session_auth = match (token, &self.auth_config) {
            (Some(token), Some(config)) => {
                let provider = AuthProvider::new(Arc::clone(config));
                match provider.update(&token).await {
                    Ok(()) => Some(Arc::new(provider)),
                    Err(err) => {
                        return self
                            .send_frame(Frame::ErrorClientID { endpoint_id, client_id, message: err.to_string() })
                            .await;
                    },
                }
            },
            (Some(_), None) => {
                return self
                    .send_frame(Frame::ErrorClientID {
                        endpoint_id,
                        client_id,
                        message: "authentication is not configured".to_string(),
                    })
                    .await;
            },
            (None, _) => None,
        };

        let Some((session_id, inbound, cancel)) = self.sessions.open(session_auth.clone()).await else {
            return self
                .send_frame(Frame::ErrorClientID {
                    endpoint_id,
                    client_id,
                    message: "session ids exhausted".to_string(),
                })
                .await;
        };

        self.send_frame(Frame::ServerSessionAck { endpoint_id, client_id, session_id }).await?;
        info!(endpoint_id, session_id, "session opened");

        let auth = session_auth.or_else(|| self.conn_auth.clone());
        let ctx = HandlerContext { endpoint_id, session_id, inbound, headers: Arc::clone(&self.headers), auth, cancel };
        let sink = ResponseSink::new(endpoint_id, session_id, Arc::clone(&self.transport));
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(async move {
            let outcome = handler.call(ctx, sink.clone()).await;
            if let Err(err) = &outcome {
                warn!(session_id, error = %err, "handler returned an error");
                let _ = sink.send_error(err.to_string()).await;
            }
            if sessions.close(session_id).await {
                let _ = sink.send_close().await;
            }
            info!(session_id, "session closed");
        });

        Ok(())
    }

    async fn on_data(&self, endpoint_id: u16, session_id: u32, payload: Bytes) -> Result<(), ConnectionError> {
        if payload.is_empty() {
            warn!(session_id, "dropping malformed zero-length data payload");
            return Ok(());
        }

        if self.sessions.push_data(session_id, payload).await {
            return Ok(());
        }

        self.send_frame(Frame::ErrorSessionID {
            endpoint_id,
            session_id,
            message: format!("unknown session {session_id}"),
        })
        .await
    }

    async fn on_authentication(&self, token: String) -> Result<(), ConnectionError> {
        let Some(provider) = &self.conn_auth else {
            return self.send_auth_error("authentication is not configured").await;
        };

        match provider.update(&token).await {
            Ok(()) => {
                let token_hash: [u8; 32] = Sha256::digest(token.as_bytes()).into();
                self.send_frame(Frame::AuthenticationAck { token_hash }).await
            },
            Err(err) => self.send_auth_error(&err.to_string()).await,
        }
    }

    /// Connection-scoped auth failures have no client or session ID to
    /// address, so they ride on `ErrorClientID` targeting the reserved
    /// auth endpoint with `client_id = 0` — the wire shape spec §7 leaves
    /// unspecified for this case; see DESIGN.md.
    async fn send_auth_error(&self, message: &str) -> Result<(), ConnectionError> {
        self.send_frame(Frame::ErrorClientID {
            endpoint_id: AUTH_ENDPOINT,
            client_id: 0,
            message: message.to_string(),
        })
        .await
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), ConnectionError> {
        self.transport.send(Bytes::from(frame.encode())).await.map_err(ConnectionError::from)
    }
}

#[cfg(test)]
mod tests {
    use hermod_core::transport::test_support::ChannelTransport;

    use super::*;

    fn registry_with_echo() -> Arc<EndpointRegistry<()>> {
        let registry = Arc::new(EndpointRegistry::new());
        registry
            .register(10, |mut ctx: HandlerContext<()>, sink: ResponseSink| async move {
                while let Some(payload) = ctx.inbound.recv().await {
                    sink.send(payload).await.map_err(crate::error::HandlerError::from)?;
                }
                Ok(())
            })
            .unwrap();
        registry
    }

    async fn read_frame(peer: &ChannelTransport) -> Frame {
        let bytes = peer.recv().await.unwrap().unwrap();
        Frame::decode(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unary_call_is_echoed_then_closed() {
        let (server_side, peer) = ChannelTransport::pair();
        let connection =
            Arc::new(Connection::<()>::new(Arc::new(server_side), registry_with_echo(), None, ConnectionConfig::default()));
        tokio::spawn(connection.run());

        peer.send(Bytes::from(Frame::ClientSessionRequest { endpoint_id: 10, client_id: 0 }.encode())).await.unwrap();
        let ack = read_frame(&peer).await;
        let session_id = match ack {
            Frame::ServerSessionAck { endpoint_id: 10, client_id: 0, session_id } => session_id,
            other => panic!("expected ServerSessionAck, got {other:?}"),
        };

        peer.send(Bytes::from(
            Frame::Data { endpoint_id: 10, session_id, payload: Bytes::from_static(b"ping:7") }.encode(),
        ))
        .await
        .unwrap();

        let echoed = read_frame(&peer).await;
        assert_eq!(echoed, Frame::Data { endpoint_id: 10, session_id, payload: Bytes::from_static(b"ping:7") });

        peer.send(Bytes::from(Frame::Close { endpoint_id: 10, session_id }.encode())).await.unwrap();
        let closed = read_frame(&peer).await;
        assert_eq!(closed, Frame::Close { endpoint_id: 10, session_id });
    }

    #[tokio::test]
    async fn unknown_endpoint_is_rejected_without_creating_a_session() {
        let (server_side, peer) = ChannelTransport::pair();
        let connection = Arc::new(Connection::<()>::new(
            Arc::new(server_side),
            Arc::new(EndpointRegistry::new()),
            None,
            ConnectionConfig::default(),
        ));
        tokio::spawn(connection.run());

        peer.send(Bytes::from(Frame::ClientSessionRequest { endpoint_id: 999, client_id: 0 }.encode())).await.unwrap();

        let reply = read_frame(&peer).await;
        assert_eq!(
            reply,
            Frame::ErrorClientID { endpoint_id: 999, client_id: 0, message: "endpoint 999 not found".to_string() }
        );
    }

    #[tokio::test]
    async fn streamed_input_is_read_in_order_before_one_reply() {
        let (server_side, peer) = ChannelTransport::pair();
        let registry: Arc<EndpointRegistry<()>> = Arc::new(EndpointRegistry::new());
        registry
            .register(20, |mut ctx: HandlerContext<()>, sink: ResponseSink| async move {
                let mut collected = Vec::new();
                while let Some(payload) = ctx.inbound.recv().await {
                    collected.extend_from_slice(&payload);
                }
                sink.send(Bytes::from(collected)).await.map_err(crate::error::HandlerError::from)
            })
            .unwrap();
        let connection =
            Arc::new(Connection::<()>::new(Arc::new(server_side), registry, None, ConnectionConfig::default()));
        tokio::spawn(connection.run());

        peer.send(Bytes::from(Frame::ClientSessionRequest { endpoint_id: 20, client_id: 0 }.encode())).await.unwrap();
        let Frame::ServerSessionAck { session_id, .. } = read_frame(&peer).await else {
            panic!("expected ack");
        };

        for chunk in [b"a" as &[u8], b"b", b"c"] {
            peer.send(Bytes::from(
                Frame::Data { endpoint_id: 20, session_id, payload: Bytes::copy_from_slice(chunk) }.encode(),
            ))
            .await
            .unwrap();
        }
        peer.send(Bytes::from(Frame::Close { endpoint_id: 20, session_id }.encode())).await.unwrap();

        let reply = read_frame(&peer).await;
        assert_eq!(
            reply,
            Frame::Data { endpoint_id: 20, session_id, payload: Bytes::from_static(b"abc") }
        );
    }

    #[tokio::test]
    async fn zero_length_data_payload_is_dropped_not_fatal() {
        let (server_side, peer) = ChannelTransport::pair();
        let connection =
            Arc::new(Connection::<()>::new(Arc::new(server_side), registry_with_echo(), None, ConnectionConfig::default()));
        tokio::spawn(connection.run());

        peer.send(Bytes::from(Frame::ClientSessionRequest { endpoint_id: 10, client_id: 0 }.encode())).await.unwrap();
        let Frame::ServerSessionAck { session_id, .. } = read_frame(&peer).await else {
            panic!("expected ack");
        };

        peer.send(Bytes::from(Frame::Data { endpoint_id: 10, session_id, payload: Bytes::new() }.encode()))
            .await
            .unwrap();
        peer.send(Bytes::from(
            Frame::Data { endpoint_id: 10, session_id, payload: Bytes::from_static(b"real") }.encode(),
        ))
        .await
        .unwrap();

        let echoed = read_frame(&peer).await;
        assert_eq!(echoed, Frame::Data { endpoint_id: 10, session_id, payload: Bytes::from_static(b"real") });
    }

    #[tokio::test]
    async fn data_for_unknown_session_yields_error_session_id() {
        let (server_side, peer) = ChannelTransport::pair();
        let connection = Arc::new(Connection::<()>::new(
            Arc::new(server_side),
            registry_with_echo(),
            None,
            ConnectionConfig::default(),
        ));
        tokio::spawn(connection.run());

        peer.send(Bytes::from(Frame::Data { endpoint_id: 10, session_id: 77, payload: Bytes::from_static(b"x") }.encode()))
            .await
            .unwrap();

        let reply = read_frame(&peer).await;
        assert_eq!(
            reply,
            Frame::ErrorSessionID { endpoint_id: 10, session_id: 77, message: "unknown session 77".to_string() }
        );
    }
}
