//! Schema types for units: `Unit`, `Field`, `FieldType`, and the decoded
//! `FilledUnit` / `FieldValue` pair.
//!
//! A real deployment generates these from a YAML schema (out of scope here,
//! see spec §1); this crate only needs the runtime shapes the codec and
//! framing layers operate on.

use std::{collections::HashMap, sync::Arc};

/// The wire type of a single field value (not counting `repeated`, which is
/// a separate flag on [`Field`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// 1-byte unsigned integer.
    TinyInt,
    /// 2-byte unsigned integer.
    SmallInt,
    /// 4-byte unsigned integer.
    Int,
    /// 8-byte unsigned integer.
    BigInt,
    /// 1-byte signed integer.
    TinyIntSigned,
    /// 2-byte signed integer.
    SmallIntSigned,
    /// 4-byte signed integer.
    IntSigned,
    /// 8-byte signed integer.
    BigIntSigned,
    /// 1-byte boolean (`0x00` false, `0xFF` true on encode; any non-zero
    /// byte decodes as true).
    Bool,
    /// UTF-8 string, length given by the field's own length prefix.
    String,
    /// A nested unit, encoded inline with its own transmission ID.
    Nested(Arc<Unit>),
}

/// One field in a [`Unit`]'s schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name, used only for diagnostics (the wire format addresses
    /// fields by `field_id`).
    pub name: String,
    /// Field identifier, unique within the owning unit.
    pub field_id: u16,
    /// The field's value type.
    pub field_type: FieldType,
    /// Selects an 8-byte length prefix instead of 4 bytes.
    pub extended: bool,
    /// Whether this field holds a list of values rather than one.
    pub repeated: bool,
}

impl Field {
    /// Convenience constructor for a non-extended, non-repeated field.
    #[must_use]
    pub fn new(name: impl Into<String>, field_id: u16, field_type: FieldType) -> Self {
        Self { name: name.into(), field_id, field_type, extended: false, repeated: false }
    }

    /// Returns a copy of this field with `extended` set.
    #[must_use]
    pub fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    /// Returns a copy of this field with `repeated` set.
    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }
}

/// A schema: a name, a transmission ID unique within its scope, and a set
/// of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Schema name, used only for diagnostics.
    pub name: String,
    /// 16-bit identifier that appears at byte 0 of every encoded unit.
    pub transmission_id: u16,
    /// The unit's fields.
    pub fields: Vec<Field>,
}

impl Unit {
    /// Creates a new schema.
    #[must_use]
    pub fn new(name: impl Into<String>, transmission_id: u16, fields: Vec<Field>) -> Self {
        Self { name: name.into(), transmission_id, fields }
    }

    /// Looks up a field by its wire ID.
    #[must_use]
    pub fn field(&self, field_id: u16) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }
}

/// A decoded (or about-to-be-encoded) value for one field.
///
/// This is a closed tagged union rather than an open interface, so decode
/// can match exhaustively (spec design notes §9).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `TinyInt` value.
    TinyInt(u8),
    /// `SmallInt` value.
    SmallInt(u16),
    /// `Int` value.
    Int(u32),
    /// `BigInt` value.
    BigInt(u64),
    /// Signed `TinyInt` value.
    TinyIntSigned(i8),
    /// Signed `SmallInt` value.
    SmallIntSigned(i16),
    /// Signed `Int` value.
    IntSigned(i32),
    /// Signed `BigInt` value.
    BigIntSigned(i64),
    /// `Bool` value.
    Bool(bool),
    /// `String` value.
    String(String),
    /// A nested filled unit.
    Nested(Box<FilledUnit>),
    /// A list of values of the field's non-repeated type.
    Repeated(Vec<FieldValue>),
}

/// A [`Unit`] schema paired with concrete values for some of its fields.
///
/// Equality ignores field insertion order, matching the "field order is
/// not significant" rule in spec §4.2.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledUnit {
    /// The schema this record conforms to.
    pub unit: Arc<Unit>,
    /// Field ID to value. Omitted fields are simply absent.
    pub values: HashMap<u16, FieldValue>,
}

impl FilledUnit {
    /// Creates an empty filled unit for `unit`.
    #[must_use]
    pub fn new(unit: Arc<Unit>) -> Self {
        Self { unit, values: HashMap::new() }
    }

    /// Sets the value for `field_id`, overwriting any previous value.
    pub fn set(&mut self, field_id: u16, value: FieldValue) -> &mut Self {
        self.values.insert(field_id, value);
        self
    }

    /// Returns the value for `field_id`, if present.
    #[must_use]
    pub fn get(&self, field_id: u16) -> Option<&FieldValue> {
        self.values.get(&field_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping_schema() -> Arc<Unit> {
        Arc::new(Unit::new("Ping", 1, vec![Field::new("N", 0, FieldType::Int)]))
    }

    #[test]
    fn field_lookup_by_id() {
        let schema = ping_schema();
        assert_eq!(schema.field(0).unwrap().name, "N");
        assert!(schema.field(99).is_none());
    }

    #[test]
    fn filled_unit_equality_ignores_insertion_order() {
        let schema = Arc::new(Unit::new(
            "Pair",
            2,
            vec![Field::new("A", 0, FieldType::Int), Field::new("B", 1, FieldType::Int)],
        ));

        let mut a = FilledUnit::new(schema.clone());
        a.set(0, FieldValue::Int(1)).set(1, FieldValue::Int(2));

        let mut b = FilledUnit::new(schema);
        b.set(1, FieldValue::Int(2)).set(0, FieldValue::Int(1));

        assert_eq!(a, b);
    }
}
