//! Wire frames (spec §4.3).
//!
//! A closed tagged union rather than a generic header+trailer pair: each
//! flag has a fixed, known shape, so decoding can match exhaustively
//! (design notes §9). Three header shapes appear on the wire depending on
//! the flag:
//!
//! - `[endpoint_id:u16][flag:u8][session_id:u32][payload]` for `Data`,
//!   `Close`, and `ErrorSessionID` (the trailing u32 is the session ID).
//! - `[endpoint_id:u16][flag:u8][client_id:u32][trailer]` for
//!   `ClientSessionRequest[WithAuth]`, `ServerSessionAck`, and
//!   `ErrorClientID` (the trailing u32 is the client ID instead).
//! - `[endpoint_id:u16][flag:u8][trailer]` for `Authentication` and
//!   `AuthenticationAck` — these carry neither a session nor a client ID
//!   and always address [`AUTH_ENDPOINT`].
//!
//! This third shape is not spelled out in the flag table itself, but it is
//! how the reference implementation frames these two flags; see DESIGN.md.

use bytes::Bytes;

use crate::{
    errors::{ProtocolError, Result},
    flags::{AUTH_ENDPOINT, Flag},
    primitives::{get_u16, get_u32, put_u16, put_u32},
};

/// A single on-wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload for an open session, either direction.
    Data {
        /// Target endpoint.
        endpoint_id: u16,
        /// Target session.
        session_id: u32,
        /// Encoded unit bytes.
        payload: Bytes,
    },
    /// Ends a session. Idempotent: a second `Close` for the same session is
    /// a no-op at the receiver.
    Close {
        /// Target endpoint.
        endpoint_id: u16,
        /// Target session.
        session_id: u32,
    },
    /// Client requests a new session with no auth trailer.
    ClientSessionRequest {
        /// Target endpoint.
        endpoint_id: u16,
        /// Client-chosen correlation ID, valid until the ack arrives.
        client_id: u32,
    },
    /// Client requests a new session with a per-session auth token.
    ClientSessionRequestWithAuth {
        /// Target endpoint.
        endpoint_id: u16,
        /// Client-chosen correlation ID, valid until the ack arrives.
        client_id: u32,
        /// Bearer token to verify and attach to the new session.
        token: String,
    },
    /// Server acknowledges a session open, assigning its session ID.
    ServerSessionAck {
        /// Target endpoint.
        endpoint_id: u16,
        /// Correlation ID from the originating request.
        client_id: u32,
        /// Newly assigned session ID.
        session_id: u32,
    },
    /// Server rejects a request before a session exists.
    ErrorClientID {
        /// Target endpoint.
        endpoint_id: u16,
        /// Correlation ID from the originating request.
        client_id: u32,
        /// Human-readable error message.
        message: String,
    },
    /// Server rejects a request once a session ID is known.
    ErrorSessionID {
        /// Target endpoint.
        endpoint_id: u16,
        /// Target session.
        session_id: u32,
        /// Human-readable error message.
        message: String,
    },
    /// Client attaches connection-scoped auth mid-connection.
    Authentication {
        /// Bearer token to verify and attach to the connection.
        token: String,
    },
    /// Server acknowledges [`Frame::Authentication`].
    AuthenticationAck {
        /// `SHA-256` of the token that was verified.
        token_hash: [u8; 32],
    },
}

impl Frame {
    /// Encodes this frame to wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Data { endpoint_id, session_id, payload } => {
                put_u16(&mut out, *endpoint_id);
                out.push(Flag::Data.to_u8());
                put_u32(&mut out, *session_id);
                out.extend_from_slice(payload);
            },
            Self::Close { endpoint_id, session_id } => {
                put_u16(&mut out, *endpoint_id);
                out.push(Flag::Close.to_u8());
                put_u32(&mut out, *session_id);
            },
            Self::ClientSessionRequest { endpoint_id, client_id } => {
                put_u16(&mut out, *endpoint_id);
                out.push(Flag::ClientSessionRequest.to_u8());
                put_u32(&mut out, *client_id);
            },
            Self::ClientSessionRequestWithAuth { endpoint_id, client_id, token } => {
                put_u16(&mut out, *endpoint_id);
                out.push(Flag::ClientSessionRequestWithAuth.to_u8());
                put_u32(&mut out, *client_id);
                out.extend_from_slice(token.as_bytes());
            },
            Self::ServerSessionAck { endpoint_id, client_id, session_id } => {
                put_u16(&mut out, *endpoint_id);
                out.push(Flag::ServerSessionAck.to_u8());
                put_u32(&mut out, *client_id);
                put_u32(&mut out, *session_id);
            },
            Self::ErrorClientID { endpoint_id, client_id, message } => {
                put_u16(&mut out, *endpoint_id);
                out.push(Flag::ErrorClientID.to_u8());
                put_u32(&mut out, *client_id);
                out.extend_from_slice(message.as_bytes());
            },
            Self::ErrorSessionID { endpoint_id, session_id, message } => {
                put_u16(&mut out, *endpoint_id);
                out.push(Flag::ErrorSessionID.to_u8());
                put_u32(&mut out, *session_id);
                out.extend_from_slice(message.as_bytes());
            },
            Self::Authentication { token } => {
                put_u16(&mut out, AUTH_ENDPOINT);
                out.push(Flag::Authentication.to_u8());
                out.extend_from_slice(token.as_bytes());
            },
            Self::AuthenticationAck { token_hash } => {
                put_u16(&mut out, AUTH_ENDPOINT);
                out.push(Flag::AuthenticationAck.to_u8());
                out.extend_from_slice(token_hash);
            },
        }
        out
    }

    /// Decodes a frame from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooShort`] if fewer than 3 bytes are
    /// present, [`ProtocolError::UnknownFlag`] for an unrecognized flag
    /// byte, and [`ProtocolError::InvalidTrailerUtf8`] if a text trailer is
    /// not valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;
        let endpoint_id = get_u16(&mut cursor)?;
        let flag_byte =
            *cursor.first().ok_or(ProtocolError::FrameTooShort { expected: 3, actual: bytes.len() })?;
        cursor = &cursor[1..];
        let flag = Flag::try_from_u8(flag_byte)?;

        match flag {
            Flag::Data => {
                let session_id = get_u32(&mut cursor)?;
                Ok(Self::Data { endpoint_id, session_id, payload: Bytes::copy_from_slice(cursor) })
            },
            Flag::Close => {
                let session_id = get_u32(&mut cursor)?;
                Ok(Self::Close { endpoint_id, session_id })
            },
            Flag::ClientSessionRequest => {
                let client_id = get_u32(&mut cursor)?;
                Ok(Self::ClientSessionRequest { endpoint_id, client_id })
            },
            Flag::ClientSessionRequestWithAuth => {
                let client_id = get_u32(&mut cursor)?;
                Ok(Self::ClientSessionRequestWithAuth { endpoint_id, client_id, token: trailer_utf8(cursor)? })
            },
            Flag::ServerSessionAck => {
                let client_id = get_u32(&mut cursor)?;
                let session_id = get_u32(&mut cursor)?;
                Ok(Self::ServerSessionAck { endpoint_id, client_id, session_id })
            },
            Flag::ErrorClientID => {
                let client_id = get_u32(&mut cursor)?;
                Ok(Self::ErrorClientID { endpoint_id, client_id, message: trailer_utf8(cursor)? })
            },
            Flag::ErrorSessionID => {
                let session_id = get_u32(&mut cursor)?;
                Ok(Self::ErrorSessionID { endpoint_id, session_id, message: trailer_utf8(cursor)? })
            },
            Flag::Authentication => Ok(Self::Authentication { token: trailer_utf8(cursor)? }),
            Flag::AuthenticationAck => {
                let token_hash: [u8; 32] = cursor
                    .try_into()
                    .map_err(|_| ProtocolError::FrameTooShort { expected: 32, actual: cursor.len() })?;
                Ok(Self::AuthenticationAck { token_hash })
            },
        }
    }

    /// The endpoint this frame targets ([`AUTH_ENDPOINT`] for the two
    /// authentication flags).
    #[must_use]
    pub fn endpoint_id(&self) -> u16 {
        match self {
            Self::Data { endpoint_id, .. }
            | Self::Close { endpoint_id, .. }
            | Self::ClientSessionRequest { endpoint_id, .. }
            | Self::ClientSessionRequestWithAuth { endpoint_id, .. }
            | Self::ServerSessionAck { endpoint_id, .. }
            | Self::ErrorClientID { endpoint_id, .. }
            | Self::ErrorSessionID { endpoint_id, .. } => *endpoint_id,
            Self::Authentication { .. } | Self::AuthenticationAck { .. } => AUTH_ENDPOINT,
        }
    }
}

fn trailer_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidTrailerUtf8)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::Data { endpoint_id: 10, session_id: 3, payload: Bytes::from_static(b"hello") },
            Frame::Close { endpoint_id: 10, session_id: 3 },
            Frame::ClientSessionRequest { endpoint_id: 10, client_id: 0 },
            Frame::ClientSessionRequestWithAuth {
                endpoint_id: 10,
                client_id: 0,
                token: "tok".to_string(),
            },
            Frame::ServerSessionAck { endpoint_id: 10, client_id: 0, session_id: 3 },
            Frame::ErrorClientID { endpoint_id: 999, client_id: 0, message: "not found".to_string() },
            Frame::ErrorSessionID { endpoint_id: 10, session_id: 3, message: "bad session".to_string() },
            Frame::Authentication { token: "tok".to_string() },
            Frame::AuthenticationAck { token_hash: [7u8; 32] },
        ]
    }

    #[test]
    fn every_flag_round_trips() {
        for frame in sample_frames() {
            let bytes = frame.encode();
            let decoded = Frame::decode(&bytes).unwrap();
            assert_eq!(frame, decoded);
        }
    }

    #[test]
    fn every_frame_starts_with_endpoint_and_flag_big_endian() {
        let data = Frame::Data { endpoint_id: 0x1234, session_id: 1, payload: Bytes::new() };
        let bytes = data.encode();
        assert_eq!(&bytes[0..2], &0x1234u16.to_be_bytes());
        assert_eq!(bytes[2], 0);
    }

    #[test]
    fn authentication_frames_always_target_the_auth_endpoint() {
        let auth = Frame::Authentication { token: "x".to_string() };
        assert_eq!(auth.endpoint_id(), AUTH_ENDPOINT);

        let ack = Frame::AuthenticationAck { token_hash: [0u8; 32] };
        assert_eq!(ack.endpoint_id(), AUTH_ENDPOINT);
    }

    #[test]
    fn truncated_data_frame_header_fails() {
        let bytes = [0u8, 1, 0]; // endpoint_id + flag only, missing session_id
        assert!(Frame::decode(&bytes).is_err());
    }

    #[test]
    fn authentication_ack_rejects_wrong_length_hash() {
        let mut bytes = Vec::new();
        put_u16(&mut bytes, AUTH_ENDPOINT);
        bytes.push(Flag::AuthenticationAck.to_u8());
        bytes.extend_from_slice(&[0u8; 10]); // not 32 bytes
        assert!(matches!(Frame::decode(&bytes), Err(ProtocolError::FrameTooShort { .. })));
    }

    impl Arbitrary for Frame {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            prop_oneof![
                (any::<u16>(), any::<u32>(), any::<Vec<u8>>())
                    .prop_map(|(e, s, p)| Self::Data { endpoint_id: e, session_id: s, payload: p.into() }),
                (any::<u16>(), any::<u32>()).prop_map(|(e, s)| Self::Close { endpoint_id: e, session_id: s }),
                (any::<u16>(), any::<u32>())
                    .prop_map(|(e, c)| Self::ClientSessionRequest { endpoint_id: e, client_id: c }),
                (any::<u16>(), any::<u32>(), "[a-zA-Z0-9]{0,16}").prop_map(|(e, c, t)| {
                    Self::ClientSessionRequestWithAuth { endpoint_id: e, client_id: c, token: t }
                }),
                (any::<u16>(), any::<u32>(), any::<u32>())
                    .prop_map(|(e, c, s)| Self::ServerSessionAck { endpoint_id: e, client_id: c, session_id: s }),
                (any::<u16>(), any::<u32>(), "[a-zA-Z0-9 ]{0,32}")
                    .prop_map(|(e, c, m)| Self::ErrorClientID { endpoint_id: e, client_id: c, message: m }),
                (any::<u16>(), any::<u32>(), "[a-zA-Z0-9 ]{0,32}")
                    .prop_map(|(e, s, m)| Self::ErrorSessionID { endpoint_id: e, session_id: s, message: m }),
            ]
            .boxed()
        }
    }

    proptest! {
        #[test]
        fn arbitrary_frame_round_trips(frame in any::<Frame>()) {
            let bytes = frame.encode();
            let decoded = Frame::decode(&bytes).expect("should decode");
            prop_assert_eq!(frame, decoded);
        }
    }
}
