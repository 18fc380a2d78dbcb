//! Stored values
//!
//! Values are untyped at the storage layer; callers name the type they expect
//! when reading and get a `TypeMismatch` instead of a coercion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single stored value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    String(String),
    Blob(Vec<u8>),
}

/// Discriminant of a [`Value`], used in type errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Long,
    Float,
    String,
    Blob,
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Blob(_) => ValueType::Blob,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// Types that can be read back out of a [`Value`]
pub trait FromValue: Sized {
    /// The stored type this Rust type maps to
    const VALUE_TYPE: ValueType;

    /// Extract `Self`, or `None` if the value holds another type
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_value_conversions {
    ($ty:ty, $variant:ident) => {
        impl FromValue for $ty {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_value_conversions!(bool, Bool);
impl_value_conversions!(i32, Int);
impl_value_conversions!(i64, Long);
impl_value_conversions!(f32, Float);
impl_value_conversions!(String, String);
impl_value_conversions!(Vec<u8>, Blob);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}
