//! WebSocket [`Transport`] (spec §6) — the one transport implementation
//! this crate ships, kept behind the `transport` feature the way the
//! teacher keeps its QUIC transport in the crate rather than in core.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hermod_core::{CoreError, Transport};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// A [`Transport`] over an accepted, already-upgraded WebSocket connection.
///
/// Text frames are base64-decoded before being handed to the frame parser
/// (spec §6); binary frames pass through untouched. Read and write halves
/// are split so `send` and `recv` never block each other, and each half is
/// wrapped in its own mutex so concurrent `send` calls serialize without
/// blocking `recv` (spec §5's transport write lock).
pub struct WebSocketTransport {
    read: Mutex<SplitStream<WebSocketStream<TcpStream>>>,
    write: Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>,
}

impl WebSocketTransport {
    /// Wraps an already-upgraded WebSocket stream.
    #[must_use]
    pub fn new(stream: WebSocketStream<TcpStream>) -> Self {
        let (write, read) = stream.split();
        Self { read: Mutex::new(read), write: Mutex::new(write) }
    }

    /// Extracts the `token` query parameter from an upgrade request path,
    /// if present (spec §6's `?token=<jwt>` connection auth).
    #[must_use]
    pub fn query_token(request_uri: &str) -> Option<String> {
        let (_, query) = request_uri.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "token").then(|| value.to_string())
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, message: Bytes) -> Result<(), CoreError> {
        let mut write = self.write.lock().await;
        write.send(Message::Binary(message)).await.map_err(|err| CoreError::Transport(err.to_string()))
    }

    async fn recv(&self) -> Result<Option<Bytes>, CoreError> {
        let mut read = self.read.lock().await;
        loop {
            return match read.next().await {
                None => Ok(None),
                Some(Err(err)) => Err(CoreError::Transport(err.to_string())),
                Some(Ok(Message::Binary(bytes))) => Ok(Some(bytes)),
                Some(Ok(Message::Text(text))) => {
                    let decoded =
                        STANDARD.decode(text.as_bytes()).map_err(|err| CoreError::Transport(err.to_string()))?;
                    Ok(Some(Bytes::from(decoded)))
                },
                Some(Ok(Message::Close(_))) => Ok(None),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            };
        }
    }

    async fn close(&self) -> Result<(), CoreError> {
        let mut write = self.write.lock().await;
        write.close().await.map_err(|err| CoreError::Transport(err.to_string()))
    }
}
