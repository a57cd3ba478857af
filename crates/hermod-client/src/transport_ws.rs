//! WebSocket [`Transport`] for connecting to a Hermod server (spec §6).

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
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Stream = MaybeTlsStream<TcpStream>;

/// A [`Transport`] over an outbound WebSocket connection.
///
/// Mirrors `hermod_server::transport_ws::WebSocketTransport`: split
/// read/write halves behind their own locks, text frames base64-decoded on
/// the way in, binary frames sent on the way out.
pub struct WebSocketTransport {
    read: Mutex<SplitStream<WebSocketStream<Stream>>>,
    write: Mutex<SplitSink<WebSocketStream<Stream>, Message>>,
}

impl WebSocketTransport {
    /// Connects to `url`, appending `?token=<token>` for connection-scoped
    /// auth at upgrade time if one is given (spec §6).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transport`] if the WebSocket handshake fails.
    pub async fn connect(url: &str, token: Option<&str>) -> Result<Self, CoreError> {
        let target = match token {
            Some(token) => format!("{url}?token={token}"),
            None => url.to_string(),
        };
        let (stream, _response) =
            tokio_tungstenite::connect_async(target).await.map_err(|err| CoreError::Transport(err.to_string()))?;
        let (write, read) = stream.split();
        Ok(Self { read: Mutex::new(read), write: Mutex::new(write) })
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
