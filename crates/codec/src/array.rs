use ndarray::ArrayD;
use serde_json::{Number, Value};
use std::fmt;

/// Element type of a [`NumericArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::I64 => "int64",
        }
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rectangular n-dimensional numeric array, the unit exchanged between
/// codecs and models.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
}

/// Runs `$body` with `$arr` bound to the inner `ArrayD<T>` of any variant.
macro_rules! dispatch {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            $crate::NumericArray::F32($arr) => $body,
            $crate::NumericArray::F64($arr) => $body,
            $crate::NumericArray::I32($arr) => $body,
            $crate::NumericArray::I64($arr) => $body,
        }
    };
}
pub(crate) use dispatch;

impl NumericArray {
    pub fn dtype(&self) -> DType {
        match self {
            NumericArray::F32(_) => DType::F32,
            NumericArray::F64(_) => DType::F64,
            NumericArray::I32(_) => DType::I32,
            NumericArray::I64(_) => DType::I64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        dispatch!(self, a => a.ndim())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts every element to `f32`. Already-`f32` arrays are returned as is.
    pub fn into_f32(self) -> Self {
        match self {
            NumericArray::F32(a) => NumericArray::F32(a),
            NumericArray::F64(a) => NumericArray::F32(a.mapv(|v| v as f32)),
            NumericArray::I32(a) => NumericArray::F32(a.mapv(|v| v as f32)),
            NumericArray::I64(a) => NumericArray::F32(a.mapv(|v| v as f32)),
        }
    }

    /// Copies the array into `f64` elements, the working type of the linear backend.
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            NumericArray::F32(a) => a.mapv(f64::from),
            NumericArray::F64(a) => a.clone(),
            NumericArray::I32(a) => a.mapv(f64::from),
            NumericArray::I64(a) => a.mapv(|v| v as f64),
        }
    }
}

macro_rules! impl_from_array {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<ArrayD<$t>> for NumericArray {
                fn from(array: ArrayD<$t>) -> Self {
                    NumericArray::$variant(array)
                }
            }
        )*
    };
}

impl_from_array!(f32 => F32, f64 => F64, i32 => I32, i64 => I64);

/// Per-element conversions shared by the codecs.
pub(crate) trait Element: Copy + 'static {
    const DTYPE: DType;

    fn to_json(self) -> Value;

    fn to_text(self) -> String;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` holds exactly `DTYPE.size()` bytes.
    fn read(bytes: &[u8], big_endian: bool) -> Self;
}

macro_rules! impl_element {
    ($t:ty, $dtype:expr, float) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            fn to_json(self) -> Value {
                Number::from_f64(f64::from(self))
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }

            // Debug keeps the trailing ".0" on integral floats.
            fn to_text(self) -> String {
                format!("{:?}", self)
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read(bytes: &[u8], big_endian: bool) -> Self {
                read_bytes!($t, bytes, big_endian)
            }
        }
    };
    ($t:ty, $dtype:expr, int) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            fn to_json(self) -> Value {
                Value::Number(Number::from(self))
            }

            fn to_text(self) -> String {
                self.to_string()
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read(bytes: &[u8], big_endian: bool) -> Self {
                read_bytes!($t, bytes, big_endian)
            }
        }
    };
}

macro_rules! read_bytes {
    ($t:ty, $bytes:expr, $big_endian:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$t>()];
        raw.copy_from_slice($bytes);
        if $big_endian {
            <$t>::from_be_bytes(raw)
        } else {
            <$t>::from_le_bytes(raw)
        }
    }};
}

impl_element!(f32, DType::F32, float);
impl_element!(f64, DType::F64, float);
impl_element!(i32, DType::I32, int);
impl_element!(i64, DType::I64, int);
