//! Error taxonomy for the server-side session multiplexer (spec §7).

use thiserror::Error;

/// Errors from registering a handler on the endpoint table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// `endpoint_id` is [`hermod_proto::flags::AUTH_ENDPOINT`], which is
    /// reserved for connection-scoped authentication frames.
    #[error("endpoint {0:#06x} is reserved for authentication and cannot be registered")]
    ReservedEndpoint(u16),

    /// An endpoint may only have one handler.
    #[error("endpoint {0:#06x} is already registered")]
    AlreadyRegistered(u16),
}

/// Errors from the per-connection dispatch loop.
///
/// Frame-level failures that address a single client or session (unknown
/// endpoint, unknown session, a rejected auth token) are not represented
/// here — they are reported in-band as `ErrorClientID`/`ErrorSessionID`
/// frames and do not stop the loop. This type covers failures that
/// terminate the connection outright (spec §7).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The auth binding rejected a token, or hydration failed.
    #[error(transparent)]
    Auth(#[from] hermod_core::AuthError),

    /// The transport failed to send or receive a message.
    #[error(transparent)]
    Core(#[from] hermod_core::CoreError),

    /// A connection- or session-scoped auth attempt was made but no
    /// [`hermod_core::AuthConfig`] was supplied to the server.
    #[error("authentication is not configured for this server")]
    AuthNotConfigured,
}

/// An error an endpoint handler returns. Carried verbatim as the payload of
/// the `ErrorSessionID` frame the multiplexer sends when a handler fails
/// (spec §4.5).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Wraps a human-readable message as a handler failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<hermod_proto::ProtocolError> for HandlerError {
    fn from(err: hermod_proto::ProtocolError) -> Self {
        Self(err.to_string())
    }
}

impl From<hermod_core::CoreError> for HandlerError {
    fn from(err: hermod_core::CoreError) -> Self {
        Self(err.to_string())
    }
}
