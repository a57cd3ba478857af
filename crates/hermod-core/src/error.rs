//! Shared error taxonomy for the auth binding and transport boundary
//! (spec §7).

use thiserror::Error;

/// Errors from verifying or hydrating a bearer token.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// The token was malformed or failed signature/claims verification.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's algorithm does not satisfy the provider's signing-method
    /// predicate.
    #[error("token uses an unsupported signing algorithm")]
    UnsupportedAlgorithm,

    /// The configured secret provider could not produce a key for this token.
    #[error("secret unavailable: {0}")]
    SecretUnavailable(String),

    /// The hydrator callback failed to derive a value from the token's claims.
    #[error("hydration failed: {0}")]
    HydrationFailed(String),
}

/// Errors surfaced across the auth binding and transport boundary.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Wraps an [`AuthError`].
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Wraps a wire-format error from `hermod-proto`.
    #[error(transparent)]
    Protocol(#[from] hermod_proto::ProtocolError),

    /// The underlying transport failed to send or receive a message.
    #[error("transport error: {0}")]
    Transport(String),

    /// An operation did not complete within its configured deadline.
    #[error("operation timed out")]
    Timeout,

    /// An operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,
}
