//! Binary wire format for Hermod.
//!
//! This crate has no I/O and no async runtime dependency. It covers:
//!
//! - [`primitives`]: big-endian integer codecs and length-prefix helpers.
//! - [`unit`]: the `Unit`/`Field`/`FilledUnit`/`FieldValue` schema types.
//! - [`codec`]: encoding and decoding filled units to and from bytes.
//! - [`bridge`]: the [`bridge::UnitCodec`] trait bridging typed records to
//!   filled units.
//! - [`flags`] and [`frame`]: the on-wire [`frame::Frame`] variants.

pub mod bridge;
pub mod codec;
pub mod errors;
pub mod flags;
pub mod frame;
pub mod primitives;
pub mod unit;

pub use bridge::UnitCodec;
pub use codec::{decode_unit, encode_unit};
pub use errors::{ProtocolError, Result};
pub use flags::{AUTH_ENDPOINT, Flag};
pub use frame::Frame;
pub use unit::{Field, FieldType, FieldValue, FilledUnit, Unit};
