//! Typed scalar values and their slot encoding.

use crate::error::{FormatError, FormatResult};
use crate::header::{FieldSpec, FieldType};

/// A scalar stored in one record slot.
///
/// String values are carried as their dictionary index; resolving text to an
/// index is the dictionary's job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Signed 64-bit integer.
    Integer(i64),
    /// IEEE double.
    Float(f64),
    /// Dictionary index of a string.
    StringIndex(i64),
    /// Seconds since the epoch.
    Timestamp(f64),
    /// Seconds since the epoch at midnight UTC.
    Date(f64),
}

impl Value {
    /// Returns the field type this value belongs to.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Integer(_) => FieldType::Integer,
            Value::Float(_) => FieldType::Float,
            Value::StringIndex(_) => FieldType::String,
            Value::Timestamp(_) => FieldType::Timestamp,
            Value::Date(_) => FieldType::Date,
        }
    }

    /// Returns the raw slot contents.
    #[must_use]
    pub fn to_slot(&self) -> i64 {
        match *self {
            Value::Integer(v) | Value::StringIndex(v) => v,
            Value::Float(v) | Value::Timestamp(v) | Value::Date(v) => v.to_bits() as i64,
        }
    }

    /// Interprets a raw slot according to `field_type`.
    #[must_use]
    pub fn from_slot(field_type: FieldType, slot: i64) -> Self {
        let float = f64::from_bits(slot as u64);
        match field_type {
            FieldType::Integer => Value::Integer(slot),
            FieldType::Float => Value::Float(float),
            FieldType::String => Value::StringIndex(slot),
            FieldType::Timestamp => Value::Timestamp(float),
            FieldType::Date => Value::Date(float),
        }
    }

    /// Encodes the value for `field`, checking that the types agree.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::TypeMismatch`] if the value's type differs from
    /// the field's declared type.
    pub fn encode_for(&self, field: &FieldSpec) -> FormatResult<i64> {
        if self.field_type() != field.field_type() {
            return Err(FormatError::TypeMismatch {
                field: field.name(),
                expected: field.field_type(),
                actual: self.field_type(),
            });
        }
        Ok(self.to_slot())
    }
}
