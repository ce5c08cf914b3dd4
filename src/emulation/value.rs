//! Values exchanged with a dynamic execution host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{metadata::userstring::UserString, Error, Result};

/// A boxed runtime value, as passed to and returned from a live method.
///
/// Unboxing is strict: [`Value::unbox_i32`] only accepts [`Value::Int32`], never a widened or
/// narrowed integer of another kind. A decrypt method whose live result has the wrong kind is
/// treated as a failed oracle query.
///
/// # Examples
///
/// ```rust
/// use cryptoscope::emulation::Value;
///
/// let value = Value::Int32(7);
/// assert_eq!(value.unbox_i32().unwrap(), 7);
/// assert!(value.unbox_i64().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Null reference
    Null,
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit floating point, exchanged as its bit pattern
    Float32(#[serde(with = "crate::utils::bits::f32_bits")] f32),
    /// 64-bit floating point, exchanged as its bit pattern
    Float64(#[serde(with = "crate::utils::bits::f64_bits")] f64),
    /// String object
    String(UserString),
}

impl Value {
    /// Short name of the value's kind, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::UnexpectedValue {
            expected,
            found: self.type_name(),
        }
    }

    /// Unboxes an `int32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedValue`] for every other kind.
    pub fn unbox_i32(&self) -> Result<i32> {
        match self {
            Value::Int32(v) => Ok(*v),
            other => Err(other.mismatch("int32")),
        }
    }

    /// Unboxes an `int64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedValue`] for every other kind.
    pub fn unbox_i64(&self) -> Result<i64> {
        match self {
            Value::Int64(v) => Ok(*v),
            other => Err(other.mismatch("int64")),
        }
    }

    /// Unboxes a `float32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedValue`] for every other kind.
    pub fn unbox_f32(&self) -> Result<f32> {
        match self {
            Value::Float32(v) => Ok(*v),
            other => Err(other.mismatch("float32")),
        }
    }

    /// Unboxes a `float64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedValue`] for every other kind.
    pub fn unbox_f64(&self) -> Result<f64> {
        match self {
            Value::Float64(v) => Ok(*v),
            other => Err(other.mismatch("float64")),
        }
    }

    /// Unboxes a non-null string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedValue`] for every other kind, `null` included.
    pub fn unbox_string(&self) -> Result<&UserString> {
        match self {
            Value::String(v) => Ok(v),
            other => Err(other.mismatch("string")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
        }
    }
}
