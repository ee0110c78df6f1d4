use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::suppression::{OverlapMode, SuppressionStep};

/// Receptive field of the proposal model; also the smallest pyramid level.
pub const PROPOSAL_CELL_SIZE: usize = 12;
/// Output stride of the proposal model over its input level.
pub const PROPOSAL_STRIDE: usize = 2;
pub const REFINE_PATCH_SIZE: usize = 24;
pub const FINALIZE_PATCH_SIZE: usize = 48;

/// Threshold test in the model's own precision: the threshold is narrowed to
/// `f32`, so a score equal to the narrowed threshold does not pass.
pub fn score_passes(score: f32, threshold: f64) -> bool {
    score > threshold as f32
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("min_face_size must be a positive number, got {0}")]
    MinFaceSize(f64),
    #[error("scale_factor must be in (0, 1), got {0}")]
    ScaleFactor(f64),
    #[error("{name} must be in [0, 1], got {value}")]
    Threshold { name: &'static str, value: f64 },
    #[error("{name} IoU threshold must be in (0, 1], got {value}")]
    Suppression { name: &'static str, value: f64 },
    #[error("max_pyramid_levels must be at least 1")]
    PyramidLevels,
}

/// Tunables for the three cascade stages.
///
/// Defaults are the usual MTCNN settings. Every field may be omitted
/// from a JSON config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Smallest face, in source pixels, the pyramid is built to find.
    pub min_face_size: f64,
    /// Shrink applied between consecutive pyramid levels.
    pub scale_factor: f64,
    /// Hard cap on pyramid depth.
    pub max_pyramid_levels: usize,
    pub proposal_threshold: f64,
    pub refine_threshold: f64,
    pub finalize_threshold: f64,
    pub proposal_level_nms: SuppressionStep,
    pub proposal_global_nms: SuppressionStep,
    pub refine_nms: SuppressionStep,
    pub finalize_nms: SuppressionStep,
    /// Refine-stage boxes whose padded side is below this are not scored.
    pub min_refine_patch: i64,
    /// Feed models BGR instead of the RGB frames the decoders produce.
    pub swap_red_blue: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            min_face_size: 20.0,
            scale_factor: 0.79,
            max_pyramid_levels: 64,
            proposal_threshold: 0.9,
            refine_threshold: 0.6,
            finalize_threshold: 0.7,
            proposal_level_nms: SuppressionStep::new(0.5, OverlapMode::Union),
            proposal_global_nms: SuppressionStep::new(0.7, OverlapMode::Union),
            refine_nms: SuppressionStep::new(0.6, OverlapMode::Union),
            finalize_nms: SuppressionStep::new(0.6, OverlapMode::Minimum),
            min_refine_patch: 20,
            swap_red_blue: true,
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Below the proposal cell the first level upsamples the frame.
        if !(self.min_face_size > 0.0 && self.min_face_size.is_finite()) {
            return Err(ConfigError::MinFaceSize(self.min_face_size));
        }
        if !(self.scale_factor > 0.0 && self.scale_factor < 1.0) {
            return Err(ConfigError::ScaleFactor(self.scale_factor));
        }
        if self.max_pyramid_levels == 0 {
            return Err(ConfigError::PyramidLevels);
        }
        for (name, value) in [
            ("proposal_threshold", self.proposal_threshold),
            ("refine_threshold", self.refine_threshold),
            ("finalize_threshold", self.finalize_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        for (name, step) in [
            ("proposal_level_nms", self.proposal_level_nms),
            ("proposal_global_nms", self.proposal_global_nms),
            ("refine_nms", self.refine_nms),
            ("finalize_nms", self.finalize_nms),
        ] {
            if !(step.threshold > 0.0 && step.threshold <= 1.0) {
                return Err(ConfigError::Suppression {
                    name,
                    value: step.threshold,
                });
            }
        }
        Ok(())
    }

    /// All suppression passes in the order the cascade runs them.
    pub fn suppression_steps(&self) -> [SuppressionStep; 4] {
        [
            self.proposal_level_nms,
            self.proposal_global_nms,
            self.refine_nms,
            self.finalize_nms,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(CascadeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_default_suppression_modes() {
        let steps = CascadeConfig::default().suppression_steps();
        let modes: Vec<_> = steps.iter().map(|s| s.mode).collect();
        assert_eq!(
            modes,
            vec![
                OverlapMode::Union,
                OverlapMode::Union,
                OverlapMode::Union,
                OverlapMode::Minimum
            ]
        );
    }

    #[rstest]
    #[case::zero_face(CascadeConfig { min_face_size: 0.0, ..Default::default() })]
    #[case::negative_face(CascadeConfig { min_face_size: -8.0, ..Default::default() })]
    #[case::infinite_face(CascadeConfig { min_face_size: f64::INFINITY, ..Default::default() })]
    #[case::nan_face(CascadeConfig { min_face_size: f64::NAN, ..Default::default() })]
    #[case::no_shrink(CascadeConfig { scale_factor: 1.0, ..Default::default() })]
    #[case::negative_shrink(CascadeConfig { scale_factor: -0.5, ..Default::default() })]
    #[case::no_levels(CascadeConfig { max_pyramid_levels: 0, ..Default::default() })]
    #[case::threshold(CascadeConfig { refine_threshold: 1.5, ..Default::default() })]
    #[case::nms(CascadeConfig {
        finalize_nms: SuppressionStep::new(0.0, OverlapMode::Minimum),
        ..Default::default()
    })]
    fn test_validate_rejects(#[case] config: CascadeConfig) {
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_face_below_cell_size_is_accepted() {
        let config = CascadeConfig {
            min_face_size: 8.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    #[case::below(0.59f32, false)]
    #[case::equal(0.6f32, false)]
    #[case::above(0.6f32 + f32::EPSILON, true)]
    fn test_score_passes_in_model_precision(#[case] score: f32, #[case] expected: bool) {
        // 0.6f32 widens to 0.6000000238, which would pass an f64 comparison.
        assert_eq!(score_passes(score, 0.6), expected);
    }

    #[test]
    fn test_threshold_error_names_field() {
        let config = CascadeConfig {
            finalize_threshold: -0.1,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("finalize_threshold"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CascadeConfig =
            serde_json::from_str(r#"{"min_face_size": 40, "refine_nms": {"threshold": 0.5, "mode": "minimum"}}"#)
                .unwrap();
        assert_eq!(config.min_face_size, 40.0);
        assert_eq!(
            config.refine_nms,
            SuppressionStep::new(0.5, OverlapMode::Minimum)
        );
        assert_eq!(config.scale_factor, 0.79);
        assert!(config.swap_red_blue);
    }
}
