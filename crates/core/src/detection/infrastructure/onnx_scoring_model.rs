//! Cascade scoring model backed by an ONNX Runtime session.
//!
//! Accepts both fully convolutional outputs (`[N, C, H, W]`) and the flat
//! `[N, C]` heads of the patch models, and reshapes them into the
//! [`ModelOutput`] layout the cascade expects.

use std::path::Path;

use ndarray::{Array2, Array3, ArrayView4, ArrayViewD, Axis, Ix2, Ix4};

use super::execution_provider::preferred_execution_providers;
use super::model_resolver::ModelPaths;
use crate::detection::domain::scoring_model::{CascadeModels, ModelError, ModelOutput, ScoringModel};

/// Index of the "face" class in the classification head.
const FACE_CLASS: usize = 1;

const REGRESSION_WIDTH: usize = 4;

pub struct OnnxScoringModel {
    session: ort::session::Session,
    apply_softmax: bool,
}

impl OnnxScoringModel {
    /// Load a model. With `apply_softmax` the classification head is treated
    /// as logits; otherwise it must already hold probabilities.
    pub fn new(model_path: &Path, apply_softmax: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        log::debug!("Loaded scoring model {}", model_path.display());
        Ok(Self {
            session,
            apply_softmax,
        })
    }
}

/// Load all three cascade stages from resolved paths.
pub fn load_cascade_models(
    paths: &ModelPaths,
    apply_softmax: bool,
) -> Result<CascadeModels, Box<dyn std::error::Error>> {
    Ok(CascadeModels::new(
        Box::new(OnnxScoringModel::new(&paths.proposal, apply_softmax)?),
        Box::new(OnnxScoringModel::new(&paths.refine, apply_softmax)?),
        Box::new(OnnxScoringModel::new(&paths.finalize, apply_softmax)?),
    ))
}

impl ScoringModel for OnnxScoringModel {
    fn infer(&mut self, batch: ArrayView4<f32>) -> Result<ModelOutput, ModelError> {
        let input_value = ort::value::Tensor::from_array(batch.to_owned())?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // Output order: classification, box regression, [landmarks].
        if outputs.len() < 2 {
            return Err(format!("expected at least 2 outputs, got {}", outputs.len()).into());
        }

        let classes = outputs[0].try_extract_array::<f32>()?;
        let regression = outputs[1].try_extract_array::<f32>()?;

        let scores = face_probabilities(as_nchw(classes, "classification")?, self.apply_softmax)?;
        let regression = as_nchw(regression, "regression")?;
        if regression.dim().1 != REGRESSION_WIDTH {
            return Err(format!(
                "regression output needs {REGRESSION_WIDTH} channels, got {:?}",
                regression.shape()
            )
            .into());
        }

        let landmarks = if outputs.len() > 2 {
            flat_landmarks(outputs[2].try_extract_array::<f32>()?)?
        } else {
            None
        };

        Ok(ModelOutput {
            scores,
            regression: regression.to_owned(),
            landmarks,
        })
    }
}

// ---------------------------------------------------------------------------
// Output reshaping
// ---------------------------------------------------------------------------

/// Views a `[N, C]` or `[N, C, H, W]` output as `[N, C, H, W]`.
fn as_nchw<'a>(raw: ArrayViewD<'a, f32>, name: &str) -> Result<ArrayView4<'a, f32>, ModelError> {
    let raw = match raw.ndim() {
        2 => raw.insert_axis(Axis(2)).insert_axis(Axis(3)),
        4 => raw,
        n => return Err(format!("{name} output must be 2-D or 4-D, got {n}-D").into()),
    };
    Ok(raw.into_dimensionality::<Ix4>()?)
}

/// Probability of the face class per cell, `[N, H, W]`.
fn face_probabilities(classes: ArrayView4<f32>, apply_softmax: bool) -> Result<Array3<f32>, ModelError> {
    let (n, channels, h, w) = classes.dim();
    if channels <= FACE_CLASS {
        return Err(format!("classification output needs 2 classes, got {channels}").into());
    }

    let mut scores = Array3::<f32>::zeros((n, h, w));
    for ((i, y, x), score) in scores.indexed_iter_mut() {
        let logits = classes.slice(ndarray::s![i, .., y, x]);
        *score = if apply_softmax {
            let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let sum: f32 = logits.iter().map(|&v| (v - max).exp()).sum();
            (logits[FACE_CLASS] - max).exp() / sum
        } else {
            logits[FACE_CLASS]
        };
    }
    Ok(scores)
}

/// Keeps a `[N, 10]` landmark head; maps from a fully convolutional stage
/// carry no usable landmarks and are dropped.
fn flat_landmarks(raw: ArrayViewD<f32>) -> Result<Option<Array2<f32>>, ModelError> {
    if raw.ndim() != 2 {
        return Ok(None);
    }
    Ok(Some(raw.into_dimensionality::<Ix2>()?.to_owned()))
}
