//! Dynamic values flowing through ports, properties, displays, and stores.
//!
//! [`Value`] is the single currency of the node runtime: input and output
//! ports, tunable properties, display cells, and persistent stores all hold
//! one. `Value::Null` doubles as the "no signal" sentinel for unpopulated
//! input ports, distinct from any present value.

mod tensor;

pub use tensor::{DType, Tensor};

use crate::error::{CortexError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A dynamic value.
///
/// Cloning is a deep copy: tensor buffers are duplicated, which is what the
/// scheduler relies on when handing signals to downstream nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / no signal.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Numeric array.
    Array(Tensor),
}

impl Value {
    /// Whether this is the null sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Canonical name of the value's type, matching the port vocabulary.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Array(_) => "ndarray",
        }
    }

    /// Read as a bool, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as an integer, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as a float; integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Read as a string slice, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read as a tensor, if this is one.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Array(t) => Some(t),
            _ => None,
        }
    }

    /// Event-stream JSON encoding: tensors appear as plain nested lists.
    ///
    /// The workspace encoding (tagged arrays) goes through `Serialize`
    /// instead.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::from(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::Str(s) => JsonValue::from(s.clone()),
            Self::Array(t) => t.to_nested(),
        }
    }

    /// Decode a value from wire JSON.
    ///
    /// Numbers become `Int` when the JSON literal is integral, `Float`
    /// otherwise. Objects are accepted only in the tagged `__array__` form;
    /// untyped JSON lists are rejected because their element type cannot be
    /// recovered.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(b) => Ok(Self::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float).ok_or_else(|| {
                        CortexError::validation("value", "unrepresentable number")
                    })
                }
            }
            JsonValue::String(s) => Ok(Self::Str(s.clone())),
            JsonValue::Object(_) => Tensor::from_tagged(value).map(Self::Array),
            JsonValue::Array(_) => Err(CortexError::validation(
                "value",
                "untyped list; arrays must use the tagged __array__ form",
            )),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Array(t) => t.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        Self::from_json(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Tensor> for Value {
    fn from(v: Tensor) -> Self {
        Self::Array(v)
    }
}
