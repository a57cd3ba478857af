//! Frame flag byte (spec §4.3). Values are chosen for log readability, not
//! for a dense bit-packed encoding.

use crate::errors::ProtocolError;

/// The endpoint ID reserved for connection-scoped authentication frames
/// (flags [`Flag::Authentication`] / [`Flag::AuthenticationAck`]). Never
/// registered as a user endpoint.
pub const AUTH_ENDPOINT: u16 = 0xFFFF;

/// The frame's flag byte, identifying its kind and trailer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Data frame carrying a payload for an open session. Both directions.
    Data = 0,
    /// Client opens a session with no auth trailer.
    ClientSessionRequest = 1,
    /// Server acknowledges a session open, trailer is the new session ID.
    ServerSessionAck = 2,
    /// Either side closes a session. Empty trailer.
    Close = 3,
    /// Server rejects a request before a session exists. UTF-8 message.
    ErrorClientID = 4,
    /// Server rejects a request after a session ID is known. UTF-8 message.
    ErrorSessionID = 5,
    /// Client attaches connection-scoped auth mid-connection. Trailer is a token.
    Authentication = 6,
    /// Server acknowledges `Authentication`. Trailer is `SHA-256(token)`.
    AuthenticationAck = 7,
    /// Client opens a session with a per-session auth token trailer.
    ClientSessionRequestWithAuth = 0x81,
}

impl Flag {
    /// The byte this flag encodes as on the wire.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parses a wire flag byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownFlag`] for any byte not in the table.
    pub fn try_from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(Self::Data),
            1 => Ok(Self::ClientSessionRequest),
            2 => Ok(Self::ServerSessionAck),
            3 => Ok(Self::Close),
            4 => Ok(Self::ErrorClientID),
            5 => Ok(Self::ErrorSessionID),
            6 => Ok(Self::Authentication),
            7 => Ok(Self::AuthenticationAck),
            0x81 => Ok(Self::ClientSessionRequestWithAuth),
            other => Err(ProtocolError::UnknownFlag(other)),
        }
    }

    /// Whether this flag belongs to a [`crate::frame::SessionFrame`] rather
    /// than a [`crate::frame::MessageFrame`].
    #[must_use]
    pub fn is_session_control(self) -> bool {
        matches!(
            self,
            Self::ClientSessionRequest
                | Self::ClientSessionRequestWithAuth
                | Self::ServerSessionAck
                | Self::Authentication
                | Self::AuthenticationAck
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_flag_round_trips_through_its_byte() {
        let flags = [
            Flag::Data,
            Flag::ClientSessionRequest,
            Flag::ServerSessionAck,
            Flag::Close,
            Flag::ErrorClientID,
            Flag::ErrorSessionID,
            Flag::Authentication,
            Flag::AuthenticationAck,
            Flag::ClientSessionRequestWithAuth,
        ];
        for flag in flags {
            assert_eq!(Flag::try_from_u8(flag.to_u8()).unwrap(), flag);
        }
    }

    #[test]
    fn unknown_byte_is_rejected() {
        assert!(matches!(Flag::try_from_u8(0x42), Err(ProtocolError::UnknownFlag(0x42))));
    }

    #[test]
    fn auth_with_token_uses_high_bit_value() {
        assert_eq!(Flag::ClientSessionRequestWithAuth.to_u8(), 0x81);
    }
}
