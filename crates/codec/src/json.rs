//! `application/json`: nested JSON arrays of numbers.

use crate::array::{Element, dispatch};
use crate::registry::{Codec, content_types};
use crate::{CodecError, NumericArray};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde_json::{Number, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        content_types::JSON
    }

    fn is_utf8(&self) -> bool {
        true
    }

    fn decode(&self, payload: &[u8]) -> Result<NumericArray, CodecError> {
        decode(payload)
    }

    fn encode(&self, array: &NumericArray) -> Result<Vec<u8>, CodecError> {
        encode(array)
    }
}

/// Parses a JSON scalar or (nested) list into an array.
///
/// All-integer payloads decode to `i64`, anything else to `f64`.
pub fn decode(payload: &[u8]) -> Result<NumericArray, CodecError> {
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidText)?;
    if text.trim().is_empty() {
        return Err(CodecError::EmptyPayload);
    }

    let value: Value = serde_json::from_str(text)?;
    let shape = infer_shape(&value);

    // The shape comes from the first element at each level only, so a ragged
    // payload can declare far more elements than it holds. Every number takes
    // at least one byte of text.
    let declared = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .unwrap_or(usize::MAX);
    let mut numbers = Vec::with_capacity(declared.min(text.len()));
    collect_numbers(&value, &shape, 0, &mut numbers)?;

    let integral: Option<Vec<i64>> = numbers.iter().map(|n| n.as_i64()).collect();
    match integral {
        Some(values) if !values.is_empty() => Ok(NumericArray::I64(ArrayD::from_shape_vec(
            IxDyn(&shape),
            values,
        )?)),
        _ => {
            let values = numbers
                .iter()
                .map(|n| {
                    n.as_f64()
                        .ok_or_else(|| CodecError::NonNumeric(n.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NumericArray::F64(ArrayD::from_shape_vec(
                IxDyn(&shape),
                values,
            )?))
        }
    }
}

/// Shape taken from the first element at every nesting level.
fn infer_shape(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut current = value;
    while let Value::Array(items) = current {
        shape.push(items.len());
        match items.first() {
            Some(first) => current = first,
            None => break,
        }
    }
    shape
}

fn collect_numbers<'a>(
    value: &'a Value,
    shape: &[usize],
    depth: usize,
    out: &mut Vec<&'a Number>,
) -> Result<(), CodecError> {
    match (value, shape.get(depth)) {
        (Value::Number(n), None) => {
            out.push(n);
            Ok(())
        }
        (Value::Array(items), Some(&expected)) if items.len() == expected => items
            .iter()
            .try_for_each(|item| collect_numbers(item, shape, depth + 1, out)),
        (Value::Array(items), Some(&expected)) => Err(CodecError::Ragged(format!(
            "expected {} elements at depth {}, found {}",
            expected,
            depth,
            items.len()
        ))),
        (Value::Array(_), None) => Err(CodecError::Ragged(format!(
            "unexpected nested list at depth {}",
            depth
        ))),
        (_, Some(_)) => Err(CodecError::Ragged(format!(
            "expected a list at depth {}, found {}",
            depth, value
        ))),
        (other, None) => Err(CodecError::NonNumeric(other.to_string())),
    }
}

/// Serializes an array as nested JSON lists (a bare value for 0-d arrays).
/// Non-finite floats become `null`.
pub fn encode(array: &NumericArray) -> Result<Vec<u8>, CodecError> {
    let value = dispatch!(array, a => to_value(a.view()));
    Ok(serde_json::to_vec(&value)?)
}

fn to_value<T: Element>(view: ArrayViewD<'_, T>) -> Value {
    if view.ndim() == 0 {
        return view.first().copied().map_or(Value::Null, T::to_json);
    }
    Value::Array(view.outer_iter().map(to_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    #[test]
    fn test_decode_integer_matrix() {
        let array = decode(b"[[1,2,3]]").unwrap();
        assert_eq!(array.dtype(), DType::I64);
        assert_eq!(array.shape(), &[1, 3]);
    }

    #[test]
    fn test_decode_mixed_numbers_promotes_to_f64() {
        let array = decode(b"[[1, 2.5], [3, 4]]").unwrap();
        assert_eq!(array.dtype(), DType::F64);
        assert_eq!(array.shape(), &[2, 2]);
        match array {
            NumericArray::F64(a) => assert_eq!(a[[0, 1]], 2.5),
            other => panic!("Expected F64, got {}", other.dtype()),
        }
    }

    #[test]
    fn test_decode_scalar_and_empty() {
        let scalar = decode(b" 7 ").unwrap();
        assert_eq!(scalar.shape(), &[] as &[usize]);
        assert_eq!(scalar.dtype(), DType::I64);

        let empty = decode(b"[]").unwrap();
        assert_eq!(empty.shape(), &[0]);
        assert_eq!(empty.dtype(), DType::F64);
    }

    #[test]
    fn test_decode_rejects_ragged_rows() {
        let err = decode(b"[[1,2],[3]]").unwrap_err();
        assert!(
            matches!(err, CodecError::Ragged(_)),
            "Ragged rows should be rejected, got {err}"
        );

        let err = decode(b"[1,[2]]").unwrap_err();
        assert!(matches!(err, CodecError::Ragged(_)), "got {err}");
    }

    /// `[[[0,0,..],0,..],0,..]` with `n` items per level declares `n^3` elements.
    fn ragged_cube(n: usize) -> Vec<u8> {
        let zeros = vec!["0"; n - 1].join(",");
        let inner = format!("[{},{}]", "0", zeros);
        let middle = format!("[{},{}]", inner, zeros);
        format!("[{},{}]", middle, zeros).into_bytes()
    }

    #[test]
    fn test_decode_ragged_payload_with_huge_declared_shape() {
        let payload = ragged_cube(200_000);
        assert!(payload.len() < 5 * 1024 * 1024);

        let err = decode(&payload).unwrap_err();
        assert!(matches!(err, CodecError::Ragged(_)), "got {err}");
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        let err = decode(br#"[["a", "b"]]"#).unwrap_err();
        assert!(matches!(err, CodecError::NonNumeric(_)), "got {err}");

        let err = decode(b"{\"instances\": [1]}").unwrap_err();
        assert!(matches!(err, CodecError::NonNumeric(_)), "got {err}");
    }

    #[test]
    fn test_decode_invalid_json_and_empty_payload() {
        assert!(matches!(decode(b"[1,2").unwrap_err(), CodecError::Json(_)));
        assert!(matches!(decode(b"   ").unwrap_err(), CodecError::EmptyPayload));
        assert!(matches!(decode(&[0xff, 0xfe]).unwrap_err(), CodecError::InvalidText));
    }

    #[test]
    fn test_encode_nested_lists() {
        let array = NumericArray::I64(ndarray::arr2(&[[1i64, 0], [2, 1]]).into_dyn());
        assert_eq!(encode(&array).unwrap(), b"[[1,0],[2,1]]");

        let labels = NumericArray::I64(ndarray::arr1(&[1i64]).into_dyn());
        assert_eq!(encode(&labels).unwrap(), b"[1]");
    }

    #[test]
    fn test_encode_floats_and_non_finite() {
        let array = NumericArray::F64(ndarray::arr1(&[0.5, f64::NAN]).into_dyn());
        assert_eq!(encode(&array).unwrap(), b"[0.5,null]");

        let scalar = NumericArray::F32(ArrayD::from_elem(IxDyn(&[]), 2.0f32));
        assert_eq!(encode(&scalar).unwrap(), b"2.0");
    }
}
