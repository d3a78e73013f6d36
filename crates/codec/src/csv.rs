//! `text/csv`: comma-separated numeric rows.

use crate::array::{Element, dispatch};
use crate::registry::{Codec, content_types};
use crate::{CodecError, NumericArray};
use ndarray::{ArrayD, ArrayViewD, IxDyn};

const DELIMITER: char = ',';

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvCodec;

impl Codec for CsvCodec {
    fn content_type(&self) -> &'static str {
        content_types::CSV
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

enum Field {
    Int(i64),
    Float(f64),
}

/// Parses CSV text into a 2-D `(rows, columns)` array.
///
/// Blank lines are skipped and fields are trimmed. Empty fields become NaN.
/// All-integer payloads decode to `i64`, anything else to `f64`.
pub fn decode(payload: &[u8]) -> Result<NumericArray, CodecError> {
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidText)?;

    let mut fields = Vec::new();
    let mut rows = 0usize;
    let mut columns = None;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut width = 0usize;
        for (column, raw) in line.split(DELIMITER).enumerate() {
            fields.push(parse_field(raw.trim(), rows, column)?);
            width += 1;
        }

        match columns {
            None => columns = Some(width),
            Some(expected) if expected != width => {
                return Err(CodecError::Ragged(format!(
                    "row {} has {} columns, expected {}",
                    rows, width, expected
                )));
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let columns = columns.ok_or(CodecError::EmptyPayload)?;
    let shape = IxDyn(&[rows, columns]);

    if fields.iter().all(|f| matches!(f, Field::Int(_))) {
        let values = fields
            .into_iter()
            .map(|f| match f {
                Field::Int(v) => v,
                Field::Float(v) => v as i64,
            })
            .collect();
        Ok(NumericArray::I64(ArrayD::from_shape_vec(shape, values)?))
    } else {
        let values = fields
            .into_iter()
            .map(|f| match f {
                Field::Int(v) => v as f64,
                Field::Float(v) => v,
            })
            .collect();
        Ok(NumericArray::F64(ArrayD::from_shape_vec(shape, values)?))
    }
}

fn parse_field(raw: &str, row: usize, column: usize) -> Result<Field, CodecError> {
    if raw.is_empty() {
        return Ok(Field::Float(f64::NAN));
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(Field::Int(v));
    }
    raw.parse::<f64>()
        .map(Field::Float)
        .map_err(|_| CodecError::InvalidNumber {
            value: raw.to_string(),
            row,
            column,
        })
}

/// Writes one row per line: 0-d arrays as a single value, 1-D arrays as one
/// value per line, 2-D arrays as comma-joined rows.
pub fn encode(array: &NumericArray) -> Result<Vec<u8>, CodecError> {
    if array.ndim() > 2 {
        return Err(CodecError::Unencodable {
            dtype: array.dtype(),
            shape: array.shape().to_vec(),
            reason: "CSV supports at most 2 dimensions",
        });
    }
    Ok(dispatch!(array, a => write_rows(a.view())).into_bytes())
}

fn write_rows<T: Element>(view: ArrayViewD<'_, T>) -> String {
    let mut out = String::new();
    match view.ndim() {
        0 | 1 => {
            for value in view.iter() {
                out.push_str(&value.to_text());
                out.push('\n');
            }
        }
        _ => {
            for row in view.outer_iter() {
                let line = row
                    .iter()
                    .map(|v| v.to_text())
                    .collect::<Vec<_>>()
                    .join(",");
                out.push_str(&line);
                out.push('\n');
            }
        }
    }
    out
}
