//! Error types for the wire codec and framing layers.

use thiserror::Error;

/// Result alias for proto-layer fallible operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors surfaced by the unit codec and frame parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The encoded stream's transmission ID did not match the expected schema.
    #[error("unknown transmission id: expected {expected}, found {found}")]
    UnknownTransmissionId {
        /// Transmission ID the decoder expected.
        expected: u16,
        /// Transmission ID actually found on the wire.
        found: u16,
    },

    /// A field ID on the wire has no corresponding entry in the schema.
    #[error("unknown field id {0} for this unit")]
    UnknownFieldId(u16),

    /// An encoded value's length does not fit in its declared width.
    #[error("length overflow: {len} bytes does not fit (max {max})")]
    LengthOverflow {
        /// Length that was attempted.
        len: usize,
        /// Maximum length the field width allows.
        max: usize,
    },

    /// Fewer bytes were available than a length prefix or fixed-width
    /// primitive required.
    #[error("truncated input: expected {expected} bytes, found {actual}")]
    TruncatedInput {
        /// Bytes the reader needed.
        expected: usize,
        /// Bytes actually remaining.
        actual: usize,
    },

    /// Decoding finished without consuming the entire input, or consumed
    /// past the expected end.
    #[error("surplus input: {0} bytes remained after decoding")]
    SurplusInput(usize),

    /// A value did not decode into the type the schema declared for its field.
    #[error("type mismatch for field {field_id}: expected {expected}")]
    TypeMismatch {
        /// Field whose value mismatched.
        field_id: u16,
        /// The type the schema expected.
        expected: &'static str,
    },

    /// A `String` field's bytes were not valid UTF-8.
    #[error("invalid utf-8 in field {field_id}")]
    Utf8Error {
        /// Field whose bytes failed to decode.
        field_id: u16,
    },

    /// A user record could not be bridged to or from a filled unit because a
    /// schema field had no corresponding record field, or vice versa.
    #[error("bridge mismatch: {0}")]
    BridgeMismatch(String),

    /// A frame's flag byte was not one of the recognized opcodes.
    #[error("unknown frame flag {0:#04x}")]
    UnknownFlag(u8),

    /// A frame was shorter than its fixed header required.
    #[error("frame too short: expected at least {expected} bytes, found {actual}")]
    FrameTooShort {
        /// Minimum bytes the frame kind required.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// A frame trailer expected to be UTF-8 text (a token or error message)
    /// was not valid UTF-8.
    #[error("invalid utf-8 in frame trailer")]
    InvalidTrailerUtf8,
}
