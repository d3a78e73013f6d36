use crate::csv::CsvCodec;
use crate::json::JsonCodec;
use crate::npy::NpyCodec;
use crate::{CodecError, NumericArray};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod content_types {
    pub const JSON: &str = "application/json";
    pub const CSV: &str = "text/csv";
    pub const NPY: &str = "application/x-npy";
    pub const ANY: &str = "*/*";
}

/// Serialization format for one media type.
pub trait Codec: Send + Sync {
    /// Media type this codec is registered under.
    fn content_type(&self) -> &'static str;

    /// Whether payloads are UTF-8 text.
    fn is_utf8(&self) -> bool;

    fn decode(&self, payload: &[u8]) -> Result<NumericArray, CodecError>;

    fn encode(&self, array: &NumericArray) -> Result<Vec<u8>, CodecError>;
}

/// Strips parameters and normalizes case: `Text/CSV; charset=utf-8` -> `text/csv`.
pub fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Maps media types to codecs.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON, CSV and NPY.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(JsonCodec);
        registry.register(CsvCodec);
        registry.register(NpyCodec);
        registry
    }

    /// Registers `codec` under its media type, replacing any previous codec.
    pub fn register(&mut self, codec: impl Codec + 'static) -> &mut Self {
        let key = normalize_media_type(codec.content_type());
        if self.codecs.insert(key.clone(), Arc::new(codec)).is_some() {
            tracing::debug!(content_type = %key, "Replaced registered codec");
        }
        self
    }

    pub fn get(&self, media_type: &str) -> Result<&dyn Codec, CodecError> {
        self.codecs
            .get(&normalize_media_type(media_type))
            .map(|codec| codec.as_ref())
            .ok_or_else(|| CodecError::UnsupportedMediaType(media_type.to_string()))
    }

    pub fn supports(&self, media_type: &str) -> bool {
        self.get(media_type).is_ok()
    }

    pub fn decode(&self, payload: &[u8], content_type: &str) -> Result<NumericArray, CodecError> {
        self.get(content_type)?.decode(payload)
    }

    pub fn encode(&self, array: &NumericArray, accept: &str) -> Result<Vec<u8>, CodecError> {
        self.get(accept)?.encode(array)
    }

    /// Registered media types, sorted.
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("content_types", &self.content_types())
            .finish()
    }
}
