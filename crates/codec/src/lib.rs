pub mod array;
pub mod csv;
pub mod errors;
pub mod json;
pub mod npy;
pub mod registry;

pub use array::{DType, NumericArray};
pub use errors::CodecError;
pub use registry::{Codec, CodecRegistry, content_types, normalize_media_type};
