//! Port data types and their compatibility rule.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Declared data type of a port.
///
/// The recognized vocabulary is `any`, `ndarray`, `int`, `float`, `str`, and
/// `bool`; anything else is carried as an opaque [`DataType::Custom`] tag
/// compared by name, so plugin-defined types connect to each other without
/// the engine knowing what they mean.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Matches anything.
    Any,
    /// Numeric array.
    NdArray,
    /// Signed integer.
    Int,
    /// Double-precision float.
    Float,
    /// UTF-8 string.
    Str,
    /// Boolean.
    Bool,
    /// Opaque user-defined tag.
    Custom(String),
}

impl DataType {
    /// Parse a data type from its canonical name (case-insensitive).
    ///
    /// Unknown names become [`DataType::Custom`] rather than failing.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "any" => Self::Any,
            "ndarray" => Self::NdArray,
            "int" => Self::Int,
            "float" => Self::Float,
            "str" => Self::Str,
            "bool" => Self::Bool,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// The canonical name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "any",
            Self::NdArray => "ndarray",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Custom(name) => name,
        }
    }

    /// Whether an output of this type may feed an input of type `other`.
    ///
    /// `any` on either side matches; otherwise names are compared
    /// case-insensitively.
    pub fn compatible(&self, other: &DataType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
