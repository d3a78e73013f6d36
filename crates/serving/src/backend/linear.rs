//! Pure-Rust backend for linear scikit-learn estimators exported to JSON.
//!
//! ```json
//! {"estimator": "classifier", "coef": [[0.5, -0.25, 1.0]], "intercept": [0.1], "classes": [0, 1]}
//! {"estimator": "regressor", "coef": [[2.0, 1.0]], "intercept": [0.5]}
//! ```
//!
//! `coef` has one row per class (one row for binary classification) or per
//! regression target, and one column per feature.

use super::Model;
use crate::errors::ModelLoadError;
use anyhow::{Context, bail};
use codec::NumericArray;
use ndarray::{Array1, Array2, Axis, Ix2};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
enum LinearArtifact {
    Classifier {
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
        classes: Vec<i64>,
    },
    Regressor {
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Head {
    Classifier { classes: Vec<i64> },
    Regressor,
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    /// `(n_outputs, n_features)`
    coef: Array2<f64>,
    intercept: Array1<f64>,
    head: Head,
}

impl LinearModel {
    pub fn from_json(json: &str) -> Result<Self, String> {
        let artifact: LinearArtifact = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let (coef, intercept, head) = match artifact {
            LinearArtifact::Classifier {
                coef,
                intercept,
                classes,
            } => (coef, intercept, Head::Classifier { classes }),
            LinearArtifact::Regressor { coef, intercept } => (coef, intercept, Head::Regressor),
        };

        let outputs = coef.len();
        let features = coef.first().map_or(0, Vec::len);
        if outputs == 0 || features == 0 {
            return Err("coef must have at least one row and one feature".to_string());
        }
        if coef.iter().any(|row| row.len() != features) {
            return Err("coef rows must all have the same length".to_string());
        }
        if intercept.len() != outputs {
            return Err(format!(
                "intercept has {} values, expected {}",
                intercept.len(),
                outputs
            ));
        }
        if let Head::Classifier { classes } = &head {
            let valid = match outputs {
                1 => classes.len() == 2,
                n => n >= 3 && classes.len() == n,
            };
            if !valid {
                return Err(format!(
                    "{} classes do not match {} coef rows",
                    classes.len(),
                    outputs
                ));
            }
        }

        let coef = Array2::from_shape_vec((outputs, features), coef.concat())
            .map_err(|e| e.to_string())?;

        Ok(Self {
            coef,
            intercept: Array1::from_vec(intercept),
            head,
        })
    }

    pub fn n_features(&self) -> usize {
        self.coef.ncols()
    }

    /// `X · coefᵀ + intercept`, shape `(n_samples, n_outputs)`.
    fn decision_function(&self, input: &NumericArray) -> anyhow::Result<Array2<f64>> {
        let x = input
            .to_f64()
            .into_dimensionality::<Ix2>()
            .with_context(|| {
                format!(
                    "Expected 2D array of shape (n_samples, n_features), got shape {:?}",
                    input.shape()
                )
            })?;
        if x.ncols() != self.n_features() {
            bail!(
                "X has {} features, but the model is expecting {} features as input",
                x.ncols(),
                self.n_features()
            );
        }
        if x.iter().any(|v| !v.is_finite()) {
            bail!("Input X contains NaN or infinity");
        }
        Ok(x.dot(&self.coef.t()) + &self.intercept)
    }
}

impl Model for LinearModel {
    fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let json = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&json).map_err(|reason| ModelLoadError::Deserialize {
            path: path.to_path_buf(),
            reason,
        })?;

        tracing::info!(
            path = %path.display(),
            features = model.n_features(),
            outputs = model.coef.nrows(),
            "Linear model loaded"
        );
        Ok(model)
    }

    fn predict(&self, input: &NumericArray) -> anyhow::Result<NumericArray> {
        let scores = self.decision_function(input)?;

        let prediction = match &self.head {
            Head::Classifier { classes } if scores.ncols() == 1 => NumericArray::I64(
                scores
                    .column(0)
                    .mapv(|s| if s > 0.0 { classes[1] } else { classes[0] })
                    .into_dyn(),
            ),
            Head::Classifier { classes } => NumericArray::I64(
                scores
                    .map_axis(Axis(1), |row| classes[argmax(row.iter().copied())])
                    .into_dyn(),
            ),
            Head::Regressor if scores.ncols() == 1 => {
                NumericArray::F64(scores.column(0).to_owned().into_dyn())
            }
            Head::Regressor => NumericArray::F64(scores.into_dyn()),
        };
        Ok(prediction)
    }
}

/// Index of the first maximal value.
fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}
