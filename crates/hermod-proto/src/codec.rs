//! Encode and decode [`FilledUnit`] values to and from self-delimiting byte
//! sequences (spec §4.2).

use std::sync::Arc;

use crate::{
    errors::{ProtocolError, Result},
    primitives::{get_length_prefix, get_u16, put_length_prefix, put_u16, take},
    unit::{Field, FieldType, FieldValue, FilledUnit, Unit},
};

/// Encodes a filled unit: `[transmission_id:u16]` then, per set field,
/// `[field_id:u16][length:u32|u64][value bytes]`.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownFieldId`] if a value is set for a field
/// ID absent from the schema, [`ProtocolError::TypeMismatch`] if a value's
/// variant does not match its field's declared type, or
/// [`ProtocolError::LengthOverflow`] if a non-extended field's value
/// exceeds 32 bits.
pub fn encode_unit(filled: &FilledUnit) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    put_u16(&mut out, filled.unit.transmission_id);

    for (&field_id, value) in &filled.values {
        let field = filled
            .unit
            .field(field_id)
            .ok_or(ProtocolError::UnknownFieldId(field_id))?;

        let encoded = encode_field_value(field, value)?;

        put_u16(&mut out, field_id);
        put_length_prefix(&mut out, encoded.len(), field.extended)?;
        out.extend_from_slice(&encoded);
    }

    Ok(out)
}

/// Decodes a filled unit against `schema`.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownTransmissionId`] if the wire's
/// transmission ID does not match `schema`, [`ProtocolError::UnknownFieldId`]
/// for field IDs absent from the schema (strict mode, spec §3),
/// [`ProtocolError::TruncatedInput`] on short reads, or
/// [`ProtocolError::TypeMismatch`] / [`ProtocolError::Utf8Error`] for
/// malformed values.
pub fn decode_unit(schema: &Arc<Unit>, bytes: &[u8]) -> Result<FilledUnit> {
    let mut cursor = bytes;

    let found = get_u16(&mut cursor)?;
    if found != schema.transmission_id {
        return Err(ProtocolError::UnknownTransmissionId {
            expected: schema.transmission_id,
            found,
        });
    }

    let mut filled = FilledUnit::new(schema.clone());

    while !cursor.is_empty() {
        let field_id = get_u16(&mut cursor)?;
        let field = schema.field(field_id).ok_or(ProtocolError::UnknownFieldId(field_id))?;

        let length = get_length_prefix(&mut cursor, field.extended)?;
        let slice = take(&mut cursor, length)?;

        let value = decode_field_value(field, &slice)?;
        filled.values.insert(field_id, value);
    }

    Ok(filled)
}

fn encode_field_value(field: &Field, value: &FieldValue) -> Result<Vec<u8>> {
    if field.repeated {
        let FieldValue::Repeated(items) = value else {
            return Err(ProtocolError::TypeMismatch { field_id: field.field_id, expected: "repeated" });
        };

        let mut out = Vec::new();
        for item in items {
            let item_bytes = encode_single_value(field, &field.field_type, item)?;
            // Item length markers are always 4 bytes, regardless of `extended`.
            put_length_prefix(&mut out, item_bytes.len(), false)?;
            out.extend_from_slice(&item_bytes);
        }
        Ok(out)
    } else {
        encode_single_value(field, &field.field_type, value)
    }
}

fn encode_single_value(field: &Field, field_type: &FieldType, value: &FieldValue) -> Result<Vec<u8>> {
    match (field_type, value) {
        (FieldType::TinyInt, FieldValue::TinyInt(v)) => Ok(vec![*v]),
        (FieldType::SmallInt, FieldValue::SmallInt(v)) => Ok(v.to_be_bytes().to_vec()),
        (FieldType::Int, FieldValue::Int(v)) => Ok(v.to_be_bytes().to_vec()),
        (FieldType::BigInt, FieldValue::BigInt(v)) => Ok(v.to_be_bytes().to_vec()),
        (FieldType::TinyIntSigned, FieldValue::TinyIntSigned(v)) => Ok(vec![v.to_be_bytes()[0]]),
        (FieldType::SmallIntSigned, FieldValue::SmallIntSigned(v)) => Ok(v.to_be_bytes().to_vec()),
        (FieldType::IntSigned, FieldValue::IntSigned(v)) => Ok(v.to_be_bytes().to_vec()),
        (FieldType::BigIntSigned, FieldValue::BigIntSigned(v)) => Ok(v.to_be_bytes().to_vec()),
        (FieldType::Bool, FieldValue::Bool(v)) => Ok(vec![if *v { 0xFF } else { 0x00 }]),
        (FieldType::String, FieldValue::String(v)) => Ok(v.as_bytes().to_vec()),
        (FieldType::Nested(nested_schema), FieldValue::Nested(nested)) => {
            if nested.unit != *nested_schema {
                return Err(ProtocolError::TypeMismatch {
                    field_id: field.field_id,
                    expected: "nested unit",
                });
            }
            encode_unit(nested)
        },
        _ => Err(ProtocolError::TypeMismatch {
            field_id: field.field_id,
            expected: type_name(field_type),
        }),
    }
}

fn decode_field_value(field: &Field, slice: &[u8]) -> Result<FieldValue> {
    if field.repeated {
        let mut items = Vec::new();
        let mut cursor = slice;
        while !cursor.is_empty() {
            let item_len = get_length_prefix(&mut cursor, false)?;
            let item_bytes = take(&mut cursor, item_len)?;
            items.push(decode_single_value(field, &field.field_type, &item_bytes)?);
        }
        Ok(FieldValue::Repeated(items))
    } else {
        decode_single_value(field, &field.field_type, slice)
    }
}

fn decode_single_value(field: &Field, field_type: &FieldType, bytes: &[u8]) -> Result<FieldValue> {
    match field_type {
        FieldType::TinyInt => Ok(FieldValue::TinyInt(expect_byte(field, bytes)?)),
        FieldType::SmallInt => Ok(FieldValue::SmallInt(u16::from_be_bytes(expect_width(field, bytes)?))),
        FieldType::Int => Ok(FieldValue::Int(u32::from_be_bytes(expect_width(field, bytes)?))),
        FieldType::BigInt => Ok(FieldValue::BigInt(u64::from_be_bytes(expect_width(field, bytes)?))),
        FieldType::TinyIntSigned => Ok(FieldValue::TinyIntSigned(expect_byte(field, bytes)? as i8)),
        FieldType::SmallIntSigned => {
            Ok(FieldValue::SmallIntSigned(i16::from_be_bytes(expect_width(field, bytes)?)))
        },
        FieldType::IntSigned => Ok(FieldValue::IntSigned(i32::from_be_bytes(expect_width(field, bytes)?))),
        FieldType::BigIntSigned => {
            Ok(FieldValue::BigIntSigned(i64::from_be_bytes(expect_width(field, bytes)?)))
        },
        FieldType::Bool => Ok(FieldValue::Bool(expect_byte(field, bytes)? != 0)),
        FieldType::String => String::from_utf8(bytes.to_vec())
            .map(FieldValue::String)
            .map_err(|_| ProtocolError::Utf8Error { field_id: field.field_id }),
        FieldType::Nested(nested_schema) => {
            let nested = decode_unit(nested_schema, bytes)?;
            Ok(FieldValue::Nested(Box::new(nested)))
        },
    }
}

fn expect_byte(field: &Field, bytes: &[u8]) -> Result<u8> {
    match bytes {
        [b] => Ok(*b),
        _ => Err(ProtocolError::TypeMismatch { field_id: field.field_id, expected: "1 byte" }),
    }
}

fn expect_width<const N: usize>(field: &Field, bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| ProtocolError::TypeMismatch { field_id: field.field_id, expected: "fixed width integer" })
}

fn type_name(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::TinyInt => "TinyInt",
        FieldType::SmallInt => "SmallInt",
        FieldType::Int => "Int",
        FieldType::BigInt => "BigInt",
        FieldType::TinyIntSigned => "TinyIntSigned",
        FieldType::SmallIntSigned => "SmallIntSigned",
        FieldType::IntSigned => "IntSigned",
        FieldType::BigIntSigned => "BigIntSigned",
        FieldType::Bool => "Bool",
        FieldType::String => "String",
        FieldType::Nested(_) => "Nested",
    }
}
