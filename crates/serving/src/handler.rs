//! The inference hooks and the service that runs them in order.
//!
//! A request goes through `input_fn` -> `predict_fn` -> `output_fn` against a
//! model produced once by `model_fn`. Each hook is a trait with a default
//! implementation; closures with the matching signature implement the traits
//! too, so any subset can be swapped when the [`HandlerService`] is built.

use crate::backend::{self, Model};
use crate::errors::{InvocationError, ModelLoadError};
use codec::{CodecRegistry, NumericArray};
use common::{span, span_debug};
use std::path::Path;
use std::sync::Arc;

/// Loads a model handle from a model directory.
pub trait ModelFn: Send + Sync {
    fn model_fn(&self, model_dir: &Path) -> Result<Arc<dyn Model>, ModelLoadError>;
}

/// Turns a request payload into an array ready for prediction.
pub trait InputFn: Send + Sync {
    fn input_fn(&self, payload: &[u8], content_type: &str)
    -> Result<NumericArray, InvocationError>;
}

/// Runs the model on a decoded input.
pub trait PredictFn: Send + Sync {
    fn predict_fn(
        &self,
        input: &NumericArray,
        model: &dyn Model,
    ) -> Result<NumericArray, InvocationError>;
}

/// Serializes a prediction, returning the bytes and their content type.
pub trait OutputFn: Send + Sync {
    fn output_fn(
        &self,
        prediction: &NumericArray,
        accept: &str,
    ) -> Result<(Vec<u8>, String), InvocationError>;
}

impl<F> ModelFn for F
where
    F: Fn(&Path) -> Result<Arc<dyn Model>, ModelLoadError> + Send + Sync,
{
    fn model_fn(&self, model_dir: &Path) -> Result<Arc<dyn Model>, ModelLoadError> {
        self(model_dir)
    }
}

impl<F> InputFn for F
where
    F: Fn(&[u8], &str) -> Result<NumericArray, InvocationError> + Send + Sync,
{
    fn input_fn(
        &self,
        payload: &[u8],
        content_type: &str,
    ) -> Result<NumericArray, InvocationError> {
        self(payload, content_type)
    }
}

impl<F> PredictFn for F
where
    F: Fn(&NumericArray, &dyn Model) -> Result<NumericArray, InvocationError> + Send + Sync,
{
    fn predict_fn(
        &self,
        input: &NumericArray,
        model: &dyn Model,
    ) -> Result<NumericArray, InvocationError> {
        self(input, model)
    }
}

impl<F> OutputFn for F
where
    F: Fn(&NumericArray, &str) -> Result<(Vec<u8>, String), InvocationError> + Send + Sync,
{
    fn output_fn(
        &self,
        prediction: &NumericArray,
        accept: &str,
    ) -> Result<(Vec<u8>, String), InvocationError> {
        self(prediction, accept)
    }
}

/// Decodes with the codec registered for `content_type`.
///
/// Text formats (JSON, CSV) are coerced to `f32`; binary formats keep the
/// element type they carry.
pub fn default_input_fn(
    codecs: &CodecRegistry,
    payload: &[u8],
    content_type: &str,
) -> Result<NumericArray, InvocationError> {
    let codec = codecs.get(content_type).map_err(InvocationError::decode)?;
    let array = codec.decode(payload).map_err(InvocationError::decode)?;

    tracing::trace!(
        content_type,
        dtype = %array.dtype(),
        shape = ?array.shape(),
        "Decoded request payload"
    );

    Ok(if codec.is_utf8() {
        array.into_f32()
    } else {
        array
    })
}

/// Delegates to the model; errors pass through untouched.
pub fn default_predict_fn(
    input: &NumericArray,
    model: &dyn Model,
) -> Result<NumericArray, InvocationError> {
    Ok(model.predict(input)?)
}

/// Encodes with the codec registered for `accept` and echoes `accept` back.
pub fn default_output_fn(
    codecs: &CodecRegistry,
    prediction: &NumericArray,
    accept: &str,
) -> Result<(Vec<u8>, String), InvocationError> {
    let body = codecs
        .encode(prediction, accept)
        .map_err(InvocationError::encode)?;
    Ok((body, accept.to_string()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultModelFn;

impl ModelFn for DefaultModelFn {
    fn model_fn(&self, model_dir: &Path) -> Result<Arc<dyn Model>, ModelLoadError> {
        backend::load_model(model_dir)
    }
}

#[derive(Debug, Clone)]
pub struct DefaultInputFn {
    codecs: Arc<CodecRegistry>,
}

impl InputFn for DefaultInputFn {
    fn input_fn(
        &self,
        payload: &[u8],
        content_type: &str,
    ) -> Result<NumericArray, InvocationError> {
        default_input_fn(&self.codecs, payload, content_type)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPredictFn;

impl PredictFn for DefaultPredictFn {
    fn predict_fn(
        &self,
        input: &NumericArray,
        model: &dyn Model,
    ) -> Result<NumericArray, InvocationError> {
        default_predict_fn(input, model)
    }
}

#[derive(Debug, Clone)]
pub struct DefaultOutputFn {
    codecs: Arc<CodecRegistry>,
}

impl OutputFn for DefaultOutputFn {
    fn output_fn(
        &self,
        prediction: &NumericArray,
        accept: &str,
    ) -> Result<(Vec<u8>, String), InvocationError> {
        default_output_fn(&self.codecs, prediction, accept)
    }
}

/// The configured set of hooks. Cheap to share behind an `Arc`.
pub struct HandlerService {
    codecs: Arc<CodecRegistry>,
    model_fn: Box<dyn ModelFn>,
    input_fn: Box<dyn InputFn>,
    predict_fn: Box<dyn PredictFn>,
    output_fn: Box<dyn OutputFn>,
}

impl HandlerService {
    /// All default hooks over `codecs`.
    pub fn new(codecs: CodecRegistry) -> Self {
        Self::builder(codecs).build()
    }

    pub fn builder(codecs: CodecRegistry) -> HandlerServiceBuilder {
        HandlerServiceBuilder {
            codecs: Arc::new(codecs),
            model_fn: None,
            input_fn: None,
            predict_fn: None,
            output_fn: None,
        }
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn load_model(&self, model_dir: &Path) -> Result<Arc<dyn Model>, ModelLoadError> {
        let _s = span!("model_fn", model_dir = %model_dir.display());
        self.model_fn.model_fn(model_dir)
    }

    /// Runs one request through `input_fn`, `predict_fn` and `output_fn`.
    pub fn transform(
        &self,
        model: &dyn Model,
        payload: &[u8],
        content_type: &str,
        accept: &str,
    ) -> Result<(Vec<u8>, String), InvocationError> {
        let input = {
            let _s = span_debug!("input_fn", content_type);
            self.input_fn.input_fn(payload, content_type)?
        };

        let prediction = {
            let _s = span!("predict_fn");
            self.predict_fn.predict_fn(&input, model)?
        };

        let _s = span_debug!("output_fn", accept);
        self.output_fn.output_fn(&prediction, accept)
    }
}

/// Selects the hooks of a [`HandlerService`]; unset hooks use the defaults.
pub struct HandlerServiceBuilder {
    codecs: Arc<CodecRegistry>,
    model_fn: Option<Box<dyn ModelFn>>,
    input_fn: Option<Box<dyn InputFn>>,
    predict_fn: Option<Box<dyn PredictFn>>,
    output_fn: Option<Box<dyn OutputFn>>,
}

impl HandlerServiceBuilder {
    pub fn model_fn(mut self, hook: impl ModelFn + 'static) -> Self {
        self.model_fn = Some(Box::new(hook));
        self
    }

    pub fn input_fn(mut self, hook: impl InputFn + 'static) -> Self {
        self.input_fn = Some(Box::new(hook));
        self
    }

    pub fn predict_fn(mut self, hook: impl PredictFn + 'static) -> Self {
        self.predict_fn = Some(Box::new(hook));
        self
    }

    pub fn output_fn(mut self, hook: impl OutputFn + 'static) -> Self {
        self.output_fn = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> HandlerService {
        let codecs = self.codecs;
        HandlerService {
            model_fn: self.model_fn.unwrap_or_else(|| Box::new(DefaultModelFn)),
            input_fn: self.input_fn.unwrap_or_else(|| {
                Box::new(DefaultInputFn {
                    codecs: Arc::clone(&codecs),
                })
            }),
            predict_fn: self.predict_fn.unwrap_or_else(|| Box::new(DefaultPredictFn)),
            output_fn: self.output_fn.unwrap_or_else(|| {
                Box::new(DefaultOutputFn {
                    codecs: Arc::clone(&codecs),
                })
            }),
            codecs,
        }
    }
}
