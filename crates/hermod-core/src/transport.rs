//! The transport boundary (spec §1, §6).
//!
//! The transport itself is out of scope: any reliable, ordered,
//! message-framed duplex stream suffices, and WebSocket is one instance.
//! This trait is the minimal contract `hermod-server` and `hermod-client`
//! need from it — send one message, receive one message, close — so that
//! neither the session multiplexer nor the route table names a concrete
//! transport.
//!
//! Implementations are responsible for the text/binary distinction their
//! underlying protocol makes; by the time bytes reach [`Transport::recv`]
//! they are already decoded binary frame data (spec §6's base64 fallback
//! for text-mode messages is a concern of the concrete implementation, not
//! of this trait).

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CoreError;

/// One end of a persistent, message-framed duplex connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one message. Implementations must serialize concurrent calls
    /// so that writes never interleave within a single message (spec §5).
    async fn send(&self, message: Bytes) -> Result<(), CoreError>;

    /// Receives the next message, or `None` if the peer closed the
    /// connection cleanly.
    async fn recv(&self) -> Result<Option<Bytes>, CoreError>;

    /// Closes the connection. Idempotent.
    async fn close(&self) -> Result<(), CoreError>;
}

/// An in-memory [`Transport`] pair for exercising dispatch/routing logic in
/// downstream crates without a real socket. Gated behind `test-support` so
/// it never ships in a production build of a dependent crate.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use tokio::sync::{mpsc, Mutex};

    use super::{Bytes, CoreError, Transport};

    /// An in-memory transport pair for exercising dispatch/routing logic
    /// without a real socket.
    pub struct ChannelTransport {
        outbox: mpsc::UnboundedSender<Bytes>,
        inbox: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    }

    impl ChannelTransport {
        /// Builds a connected pair: sending on one delivers to `recv` on the other.
        pub fn pair() -> (Self, Self) {
            let (tx_a, rx_a) = mpsc::unbounded_channel();
            let (tx_b, rx_b) = mpsc::unbounded_channel();
            (
                Self { outbox: tx_a, inbox: Mutex::new(rx_b) },
                Self { outbox: tx_b, inbox: Mutex::new(rx_a) },
            )
        }
    }

    #[async_trait::async_trait]
    impl Transport for ChannelTransport {
        async fn send(&self, message: Bytes) -> Result<(), CoreError> {
            self.outbox.send(message).map_err(|e| CoreError::Transport(e.to_string()))
        }

        async fn recv(&self) -> Result<Option<Bytes>, CoreError> {
            let mut guard = self.inbox.lock().await;
            Ok(guard.recv().await)
        }

        async fn close(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{test_support::ChannelTransport, Transport};

    #[tokio::test]
    async fn paired_channel_transports_deliver_messages() {
        let (a, b) = ChannelTransport::pair();
        a.send(Bytes::from_static(b"hello")).await.unwrap();
        let received = b.recv().await.unwrap().unwrap();
        assert_eq!(received, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn dropping_the_sender_side_yields_none() {
        let (a, b) = ChannelTransport::pair();
        drop(a);
        assert!(b.recv().await.unwrap().is_none());
    }
}
