use ndarray::{Array2, Array3, Array4, ArrayView4};

use super::cascade_config::{CascadeConfig, ConfigError};
use super::cascade_detector::CascadeDetector;

pub type ModelError = Box<dyn std::error::Error + Send + Sync>;

/// Raw output of one scoring model call over a `[N, 3, H, W]` batch.
///
/// Patch models (refine, finalize) report a `1 × 1` map per patch; the
/// proposal model reports one cell per output position of its sliding
/// window.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelOutput {
    /// Face probability, `[N, H, W]`.
    pub scores: Array3<f32>,
    /// Corner regression, `[N, 4, H, W]`, ordered `dx1, dy1, dx2, dy2`.
    pub regression: Array4<f32>,
    /// Landmark regression `[N, 10]` as `x0, y0, …, x4, y4`, relative to the
    /// patch. Only the finalize model produces it.
    pub landmarks: Option<Array2<f32>>,
}

/// One stage's scoring network.
///
/// `&mut self` because inference sessions keep scratch buffers between runs.
pub trait ScoringModel: Send {
    fn infer(&mut self, batch: ArrayView4<f32>) -> Result<ModelOutput, ModelError>;
}

/// The three models of a cascade, owned together.
///
/// A [`CascadeDetector`] only borrows them, so one loaded set can serve many
/// detectors in sequence while loading and teardown stay with the owner.
pub struct CascadeModels {
    pub proposal: Box<dyn ScoringModel>,
    pub refine: Box<dyn ScoringModel>,
    pub finalize: Box<dyn ScoringModel>,
}

impl CascadeModels {
    pub fn new(
        proposal: Box<dyn ScoringModel>,
        refine: Box<dyn ScoringModel>,
        finalize: Box<dyn ScoringModel>,
    ) -> Self {
        Self {
            proposal,
            refine,
            finalize,
        }
    }

    /// Lends the models to a detector running `config`.
    pub fn detector(&mut self, config: CascadeConfig) -> Result<CascadeDetector<'_>, ConfigError> {
        CascadeDetector::new(
            self.proposal.as_mut(),
            self.refine.as_mut(),
            self.finalize.as_mut(),
            config,
        )
    }
}
