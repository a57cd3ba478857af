//! Error taxonomy for the client-side route multiplexer (spec §7).

use thiserror::Error;

/// Errors a [`crate::readwriter::ServiceReadWriter`] or [`crate::router::Router`]
/// call can surface to the application.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The underlying transport failed to send or receive a message.
    #[error(transparent)]
    Core(#[from] hermod_core::CoreError),

    /// A frame failed to decode.
    #[error(transparent)]
    Protocol(#[from] hermod_proto::ProtocolError),

    /// The session-open handshake did not complete within the configured
    /// timeout. The route's client ID has already been released.
    #[error("session open timed out")]
    Timeout,

    /// The route was closed (locally or by the peer) before the operation
    /// completed.
    #[error("route is closed")]
    Closed,

    /// The server rejected the request; the message is the
    /// `ErrorClientID`/`ErrorSessionID` payload verbatim.
    #[error("server error: {0}")]
    Server(String),

    /// The router's client-ID space is exhausted.
    #[error("client ids are exhausted")]
    IdsExhausted,
}
