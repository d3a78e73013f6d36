//! `application/x-npy`: the NumPy `.npy` binary format.
//!
//! Layout: magic `\x93NUMPY`, major/minor version bytes, a little-endian
//! header length (u16 for v1, u32 for v2/v3), an ASCII Python dict literal
//! describing `descr`, `fortran_order` and `shape`, then the raw data.

use crate::array::{Element, dispatch};
use crate::registry::{Codec, content_types};
use crate::{CodecError, DType, NumericArray};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Default, Clone, Copy)]
pub struct NpyCodec;

impl Codec for NpyCodec {
    fn content_type(&self) -> &'static str {
        content_types::NPY
    }

    fn is_utf8(&self) -> bool {
        false
    }

    fn decode(&self, payload: &[u8]) -> Result<NumericArray, CodecError> {
        decode(payload)
    }

    fn encode(&self, array: &NumericArray) -> Result<Vec<u8>, CodecError> {
        Ok(encode(array))
    }
}

#[derive(Debug, PartialEq)]
struct Header {
    dtype: DType,
    big_endian: bool,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Decodes a `.npy` payload, keeping the element type it declares.
pub fn decode(payload: &[u8]) -> Result<NumericArray, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    let (header, data) = split_header(payload)?;
    let header = parse_header(header)?;

    let expected = header
        .shape
        .iter()
        .try_fold(header.dtype.size(), |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| CodecError::InvalidNpy("shape too large".to_string()))?;
    if data.len() < expected {
        return Err(CodecError::InvalidNpy(format!(
            "expected {} data bytes, found {}",
            expected,
            data.len()
        )));
    }
    let data = &data[..expected];

    Ok(match header.dtype {
        DType::F32 => NumericArray::F32(read_array(data, &header)?),
        DType::F64 => NumericArray::F64(read_array(data, &header)?),
        DType::I32 => NumericArray::I32(read_array(data, &header)?),
        DType::I64 => NumericArray::I64(read_array(data, &header)?),
    })
}

fn split_header(payload: &[u8]) -> Result<(&str, &[u8]), CodecError> {
    if payload.len() < MAGIC.len() + 2 || !payload.starts_with(MAGIC) {
        return Err(CodecError::InvalidNpy("missing magic string".to_string()));
    }
    let major = payload[MAGIC.len()];
    let rest = &payload[MAGIC.len() + 2..];

    let (header_len, rest) = match major {
        1 if rest.len() >= 2 => (u16::from_le_bytes([rest[0], rest[1]]) as usize, &rest[2..]),
        2 | 3 if rest.len() >= 4 => (
            u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize,
            &rest[4..],
        ),
        1..=3 => return Err(CodecError::InvalidNpy("truncated header".to_string())),
        other => {
            return Err(CodecError::InvalidNpy(format!(
                "unsupported format version {}",
                other
            )));
        }
    };

    if rest.len() < header_len {
        return Err(CodecError::InvalidNpy("truncated header".to_string()));
    }
    let (header, data) = rest.split_at(header_len);
    let header = std::str::from_utf8(header)
        .map_err(|_| CodecError::InvalidNpy("header is not valid text".to_string()))?;
    Ok((header, data))
}

fn parse_header(header: &str) -> Result<Header, CodecError> {
    let descr = dict_value(header, "descr")?;
    let descr = descr
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '\'' || c == '"');
    let (dtype, big_endian) = parse_descr(descr)?;

    let fortran_order = match dict_value(header, "fortran_order")?
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
    {
        "True" => true,
        "False" => false,
        other => {
            return Err(CodecError::InvalidNpy(format!(
                "invalid fortran_order {:?}",
                other
            )));
        }
    };

    let shape_text = dict_value(header, "shape")?.trim_start();
    let shape_text = shape_text
        .strip_prefix('(')
        .and_then(|s| s.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(|| CodecError::InvalidNpy("shape is not a tuple".to_string()))?;
    let shape = shape_text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| CodecError::InvalidNpy(format!("invalid dimension {:?}", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Header {
        dtype,
        big_endian,
        fortran_order,
        shape,
    })
}

/// Text following `'key':` in the header dict.
fn dict_value<'a>(header: &'a str, key: &str) -> Result<&'a str, CodecError> {
    let quoted = format!("'{}'", key);
    let start = header
        .find(&quoted)
        .ok_or_else(|| CodecError::InvalidNpy(format!("header has no {:?} entry", key)))?;
    let rest = &header[start + quoted.len()..];
    rest.trim_start()
        .strip_prefix(':')
        .ok_or_else(|| CodecError::InvalidNpy(format!("malformed {:?} entry", key)))
}

fn parse_descr(descr: &str) -> Result<(DType, bool), CodecError> {
    let unsupported = || CodecError::UnsupportedDtype(descr.to_string());
    let mut chars = descr.chars();
    let big_endian = match chars.next() {
        Some('<') => false,
        Some('>') => true,
        Some('=') => cfg!(target_endian = "big"),
        _ => return Err(unsupported()),
    };
    let dtype = match chars.as_str() {
        "f4" => DType::F32,
        "f8" => DType::F64,
        "i4" => DType::I32,
        "i8" => DType::I64,
        _ => return Err(unsupported()),
    };
    Ok((dtype, big_endian))
}

fn read_array<T: Element>(data: &[u8], header: &Header) -> Result<ArrayD<T>, CodecError> {
    let values = data
        .chunks_exact(T::DTYPE.size())
        .map(|chunk| T::read(chunk, header.big_endian))
        .collect::<Vec<_>>();
    let shape = IxDyn(&header.shape);
    let array = if header.fortran_order {
        ArrayD::from_shape_vec(shape.f(), values)?
    } else {
        ArrayD::from_shape_vec(shape, values)?
    };
    Ok(array)
}

/// Encodes a `.npy` v1.0 payload in C order with a little-endian descr.
pub fn encode(array: &NumericArray) -> Vec<u8> {
    let shape = match array.shape() {
        [single] => format!("({},)", single),
        dims => format!(
            "({})",
            dims.iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let descr = match array.dtype() {
        DType::F32 => "<f4",
        DType::F64 => "<f8",
        DType::I32 => "<i4",
        DType::I64 => "<i8",
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr, shape
    );

    // Pad with spaces so the data starts on an aligned offset; the header ends with '\n'.
    let prefix = MAGIC.len() + 2 + 2;
    let total = (prefix + header.len() + 1).div_ceil(HEADER_ALIGNMENT) * HEADER_ALIGNMENT;
    header.push_str(&" ".repeat(total - prefix - header.len() - 1));
    header.push('\n');

    let mut out = Vec::with_capacity(total + array.len() * array.dtype().size());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    dispatch!(array, a => a.iter().for_each(|v| v.write_le(&mut out)));
    out
}
