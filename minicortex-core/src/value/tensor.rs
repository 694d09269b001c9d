//! Dense numeric arrays with a canonical element type.
//!
//! Tensors are the payload behind the `ndarray` port data type. They carry
//! their dtype explicitly so workspace files can restore the exact element
//! type, not just the values.

use crate::error::{CortexError, Result};
use ndarray::{ArrayD, IxDyn};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};
use std::fmt;

/// Canonical element types for tensors.
///
/// Names follow the numpy vocabulary (`float32`, `int64`, ...) so workspace
/// files interoperate with numpy-based tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit floating point.
    #[serde(rename = "float32")]
    F32,
    /// 64-bit floating point.
    #[serde(rename = "float64")]
    F64,
    /// Signed 64-bit integer.
    #[serde(rename = "int64")]
    I64,
    /// Unsigned 8-bit integer.
    #[serde(rename = "uint8")]
    U8,
}

impl DType {
    /// Parse a dtype from its canonical name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "float32" => Some(Self::F32),
            "float64" => Some(Self::F64),
            "int64" => Some(Self::I64),
            "uint8" => Some(Self::U8),
            _ => None,
        }
    }

    /// The canonical name of this dtype.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::I64 => "int64",
            Self::U8 => "uint8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dense n-dimensional array tagged by element type.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    /// 32-bit float elements.
    F32(ArrayD<f32>),
    /// 64-bit float elements.
    F64(ArrayD<f64>),
    /// Signed 64-bit integer elements.
    I64(ArrayD<i64>),
    /// Unsigned 8-bit integer elements.
    U8(ArrayD<u8>),
}

impl Tensor {
    /// The element type.
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
            Self::I64(_) => DType::I64,
            Self::U8(_) => DType::U8,
        }
    }

    /// The array shape.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F32(a) => a.shape(),
            Self::F64(a) => a.shape(),
            Self::I64(a) => a.shape(),
            Self::U8(a) => a.shape(),
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    /// Whether the tensor has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode the element data as nested JSON lists (row-major, untagged).
    ///
    /// This is the event-stream encoding; the workspace encoding wraps it in
    /// a `__array__` tag via the `Serialize` impl.
    pub fn to_nested(&self) -> JsonValue {
        fn float(v: f64) -> JsonValue {
            Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
        }
        match self {
            Self::F32(a) => nest(a.shape(), &a.iter().map(|&v| float(v as f64)).collect::<Vec<_>>()),
            Self::F64(a) => nest(a.shape(), &a.iter().map(|&v| float(v)).collect::<Vec<_>>()),
            Self::I64(a) => nest(a.shape(), &a.iter().map(|&v| JsonValue::from(v)).collect::<Vec<_>>()),
            Self::U8(a) => nest(a.shape(), &a.iter().map(|&v| JsonValue::from(v)).collect::<Vec<_>>()),
        }
    }

    /// Reconstruct a tensor from nested JSON lists plus an explicit dtype and
    /// shape (the workspace decoding path).
    pub fn from_nested(dtype: DType, shape: &[usize], data: &JsonValue) -> Result<Self> {
        match dtype {
            DType::F32 => {
                let mut flat = Vec::new();
                flatten_floats(data, &mut flat)?;
                build(shape, flat.into_iter().map(|v| v as f32).collect()).map(Self::F32)
            }
            DType::F64 => {
                let mut flat = Vec::new();
                flatten_floats(data, &mut flat)?;
                build(shape, flat).map(Self::F64)
            }
            DType::I64 => {
                let mut flat = Vec::new();
                flatten_ints(data, &mut flat)?;
                build(shape, flat).map(Self::I64)
            }
            DType::U8 => {
                let mut flat = Vec::new();
                flatten_ints(data, &mut flat)?;
                let bytes = flat
                    .into_iter()
                    .map(|v| {
                        u8::try_from(v).map_err(|_| {
                            CortexError::validation("array", format!("value {v} out of range for uint8"))
                        })
                    })
                    .collect::<Result<Vec<u8>>>()?;
                build(shape, bytes).map(Self::U8)
            }
        }
    }

    /// Decode the tagged workspace encoding
    /// `{"__array__": true, "dtype", "shape", "data"}`.
    pub fn from_tagged(value: &JsonValue) -> Result<Self> {
        let obj = value
            .as_object()
            .filter(|o| o.get("__array__").and_then(JsonValue::as_bool) == Some(true))
            .ok_or_else(|| CortexError::validation("array", "missing __array__ tag"))?;

        let dtype = obj
            .get("dtype")
            .and_then(JsonValue::as_str)
            .and_then(DType::parse)
            .ok_or_else(|| CortexError::validation("array", "missing or unknown dtype"))?;
        let shape = obj
            .get("shape")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| CortexError::validation("array", "missing shape"))?
            .iter()
            .map(|v| {
                v.as_u64()
                    .map(|n| n as usize)
                    .ok_or_else(|| CortexError::validation("array", "non-integer shape entry"))
            })
            .collect::<Result<Vec<usize>>>()?;
        let data = obj
            .get("data")
            .ok_or_else(|| CortexError::validation("array", "missing data"))?;

        Self::from_nested(dtype, &shape, data)
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(a: ArrayD<f32>) -> Self {
        Self::F32(a)
    }
}

impl From<ArrayD<f64>> for Tensor {
    fn from(a: ArrayD<f64>) -> Self {
        Self::F64(a)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(a: ArrayD<i64>) -> Self {
        Self::I64(a)
    }
}

impl From<ArrayD<u8>> for Tensor {
    fn from(a: ArrayD<u8>) -> Self {
        Self::U8(a)
    }
}

impl Serialize for Tensor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("__array__", &true)?;
        map.serialize_entry("dtype", self.dtype().as_str())?;
        map.serialize_entry("shape", self.shape())?;
        map.serialize_entry("data", &self.to_nested())?;
        map.end()
    }
}

fn build<T>(shape: &[usize], flat: Vec<T>) -> Result<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape), flat)
        .map_err(|e| CortexError::validation("array", format!("shape/data mismatch: {e}")))
}

fn nest(shape: &[usize], flat: &[JsonValue]) -> JsonValue {
    match shape {
        [] => flat.first().cloned().unwrap_or(JsonValue::Null),
        [_] => JsonValue::Array(flat.to_vec()),
        [n, rest @ ..] => {
            let chunk = if *n == 0 { 0 } else { flat.len() / n };
            if chunk == 0 {
                return JsonValue::Array(Vec::new());
            }
            JsonValue::Array(flat.chunks(chunk).map(|c| nest(rest, c)).collect())
        }
    }
}

fn flatten_floats(v: &JsonValue, out: &mut Vec<f64>) -> Result<()> {
    match v {
        JsonValue::Array(items) => {
            for item in items {
                flatten_floats(item, out)?;
            }
            Ok(())
        }
        JsonValue::Number(n) => {
            out.push(
                n.as_f64()
                    .ok_or_else(|| CortexError::validation("array", "non-finite element"))?,
            );
            Ok(())
        }
        other => Err(CortexError::validation(
            "array",
            format!("expected number, got {other}"),
        )),
    }
}

fn flatten_ints(v: &JsonValue, out: &mut Vec<i64>) -> Result<()> {
    match v {
        JsonValue::Array(items) => {
            for item in items {
                flatten_ints(item, out)?;
            }
            Ok(())
        }
        JsonValue::Number(n) => {
            out.push(
                n.as_i64()
                    .ok_or_else(|| CortexError::validation("array", "non-integer element"))?,
            );
            Ok(())
        }
        other => Err(CortexError::validation(
            "array",
            format!("expected integer, got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn dtype_names_round_trip() {
        for dtype in [DType::F32, DType::F64, DType::I64, DType::U8] {
            assert_eq!(DType::parse(dtype.as_str()), Some(dtype));
        }
        assert_eq!(DType::parse("complex128"), None);
    }

    #[test]
    fn nested_round_trip_2d() {
        let t = Tensor::from(array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn());
        let nested = t.to_nested();
        let back = Tensor::from_nested(DType::F32, &[2, 3], &nested).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn tagged_round_trip_preserves_dtype() {
        let t = Tensor::from(array![[0u8, 255], [7, 42]].into_dyn());
        let tagged = serde_json::to_value(&t).unwrap();
        assert_eq!(tagged["__array__"], true);
        assert_eq!(tagged["dtype"], "uint8");
        assert_eq!(tagged["shape"], serde_json::json!([2, 2]));

        let back = Tensor::from_tagged(&tagged).unwrap();
        assert_eq!(back.dtype(), DType::U8);
        assert_eq!(back, t);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let nested = serde_json::json!([1, 2, 3]);
        let err = Tensor::from_nested(DType::I64, &[2, 2], &nested).unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn uint8_range_is_enforced() {
        let nested = serde_json::json!([300]);
        let err = Tensor::from_nested(DType::U8, &[1], &nested).unwrap_err();
        assert_eq!(err.code(), "validation");
    }
}
