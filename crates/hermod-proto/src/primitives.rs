//! Fixed-width big-endian integer codecs and length-prefix helpers.
//!
//! Every multi-byte integer on the wire is big-endian. Length prefixes are
//! either 4 or 8 bytes depending on whether the enclosing field is
//! `extended`; repeated-field item markers are always 4 bytes regardless of
//! the parent field's `extended` flag.

use crate::errors::{ProtocolError, Result};

/// Writes `value` as a big-endian `u16` onto `out`.
pub fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Writes `value` as a big-endian `u32` onto `out`.
pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Writes `value` as a big-endian `u64` onto `out`.
pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Reads a big-endian `u16` from the front of `input`, advancing it.
pub fn get_u16(input: &mut &[u8]) -> Result<u16> {
    let (head, rest) = split_at(input, 2)?;
    *input = rest;
    Ok(u16::from_be_bytes([head[0], head[1]]))
}

/// Reads a big-endian `u32` from the front of `input`, advancing it.
pub fn get_u32(input: &mut &[u8]) -> Result<u32> {
    let (head, rest) = split_at(input, 4)?;
    *input = rest;
    Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
}

/// Reads a big-endian `u64` from the front of `input`, advancing it.
pub fn get_u64(input: &mut &[u8]) -> Result<u64> {
    let (head, rest) = split_at(input, 8)?;
    *input = rest;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(head);
    Ok(u64::from_be_bytes(buf))
}

/// Writes a length prefix for `len` bytes: 8 bytes if `extended`, else 4.
///
/// # Errors
///
/// Returns [`ProtocolError::LengthOverflow`] if `extended` is false and
/// `len` does not fit in a `u32`.
pub fn put_length_prefix(out: &mut Vec<u8>, len: usize, extended: bool) -> Result<()> {
    if extended {
        put_u64(out, len as u64);
    } else {
        let len32 = u32::try_from(len).map_err(|_| ProtocolError::LengthOverflow {
            len,
            max: u32::MAX as usize,
        })?;
        put_u32(out, len32);
    }
    Ok(())
}

/// Reads a length prefix (8 bytes if `extended`, else 4) and returns it as
/// a `usize`, advancing `input`.
pub fn get_length_prefix(input: &mut &[u8], extended: bool) -> Result<usize> {
    if extended {
        Ok(get_u64(input)? as usize)
    } else {
        Ok(get_u32(input)? as usize)
    }
}

/// Splits `input` into `(first len bytes, remainder)`, failing if too short.
fn split_at<'a>(input: &'a [u8], len: usize) -> Result<(&'a [u8], &'a [u8])> {
    if input.len() < len {
        return Err(ProtocolError::TruncatedInput { expected: len, actual: input.len() });
    }
    Ok(input.split_at(len))
}

/// Reads exactly `len` bytes from the front of `input`, advancing it.
pub fn take(input: &mut &[u8], len: usize) -> Result<Vec<u8>> {
    let (head, rest) = split_at(input, len)?;
    let owned = head.to_vec();
    *input = rest;
    Ok(owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_u16() {
        let mut buf = Vec::new();
        put_u16(&mut buf, 0xABCD);
        let mut cursor = buf.as_slice();
        assert_eq!(get_u16(&mut cursor).unwrap(), 0xABCD);
        assert!(cursor.is_empty());
    }

    #[test]
    fn round_trip_u32() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 0xDEAD_BEEF);
        let mut cursor = buf.as_slice();
        assert_eq!(get_u32(&mut cursor).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn round_trip_u64() {
        let mut buf = Vec::new();
        put_u64(&mut buf, 0x0123_4567_89AB_CDEF);
        let mut cursor = buf.as_slice();
        assert_eq!(get_u64(&mut cursor).unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn truncated_read_fails() {
        let buf = [0u8; 1];
        let mut cursor = buf.as_slice();
        assert!(matches!(get_u16(&mut cursor), Err(ProtocolError::TruncatedInput { .. })));
    }

    #[test]
    fn length_prefix_non_extended_is_four_bytes() {
        let mut buf = Vec::new();
        put_length_prefix(&mut buf, 42, false).unwrap();
        assert_eq!(buf.len(), 4);
        let mut cursor = buf.as_slice();
        assert_eq!(get_length_prefix(&mut cursor, false).unwrap(), 42);
    }

    #[test]
    fn length_prefix_extended_is_eight_bytes() {
        let mut buf = Vec::new();
        put_length_prefix(&mut buf, 42, true).unwrap();
        assert_eq!(buf.len(), 8);
        let mut cursor = buf.as_slice();
        assert_eq!(get_length_prefix(&mut cursor, true).unwrap(), 42);
    }

    #[test]
    fn non_extended_length_overflow_rejected() {
        let mut buf = Vec::new();
        let too_big = usize::try_from(u32::MAX).unwrap() as usize + 1;
        assert!(matches!(
            put_length_prefix(&mut buf, too_big, false),
            Err(ProtocolError::LengthOverflow { .. })
        ));
    }

    #[test]
    fn extended_length_accepts_value_above_u32_max() {
        let mut buf = Vec::new();
        let big = usize::try_from(u32::MAX).unwrap() as usize + 1;
        assert!(put_length_prefix(&mut buf, big, true).is_ok());
    }
}
