//! Decodes the proposal model's dense output map into candidate boxes.

use ndarray::{ArrayView2, ArrayView3};

use super::cascade_config::{score_passes, PROPOSAL_CELL_SIZE, PROPOSAL_STRIDE};
use super::detection_error::{DetectionError, Stage};
use crate::shared::face_box::{BoxRegression, Candidate, FaceBox};

/// Turns one pyramid level's `[H, W]` score map and `[4, H, W]` regression
/// map into candidates in source-image coordinates.
///
/// Cells are visited row by row. Only cells scoring strictly above
/// `threshold` produce a candidate; its regression is carried along
/// unapplied.
pub fn generate(
    scores: ArrayView2<f32>,
    regression: ArrayView3<f32>,
    scale: f64,
    threshold: f64,
) -> Result<Vec<Candidate>, DetectionError> {
    let (rows, cols) = scores.dim();
    if regression.dim() != (4, rows, cols) {
        return Err(DetectionError::malformed(
            Stage::Proposal,
            format!(
                "regression map {:?} does not match score map {:?}",
                regression.shape(),
                scores.shape()
            ),
        ));
    }

    let stride = PROPOSAL_STRIDE as f64;
    let cell = PROPOSAL_CELL_SIZE as f64;
    let mut candidates = Vec::new();

    for ((row, col), &score) in scores.indexed_iter() {
        if !score_passes(score, threshold) {
            continue;
        }
        let score = score as f64;
        let (x, y) = (col as f64 * stride, row as f64 * stride);
        let bbox = FaceBox::new(
            (x / scale).round_ties_even(),
            (y / scale).round_ties_even(),
            ((x + cell) / scale).round_ties_even(),
            ((y + cell) / scale).round_ties_even(),
            score,
        );
        let offsets = BoxRegression::new(
            regression[[0, row, col]] as f64,
            regression[[1, row, col]] as f64,
            regression[[2, row, col]] as f64,
            regression[[3, row, col]] as f64,
        );
        candidates.push(Candidate {
            bbox,
            regression: offsets,
        });
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_only_cells_above_threshold_emit() {
        let mut scores = Array2::<f32>::zeros((3, 4));
        scores[[1, 2]] = 0.95;
        scores[[2, 0]] = 0.9; // equal to threshold
        let regression = Array3::<f32>::zeros((4, 3, 4));
        let out = generate(scores.view(), regression.view(), 1.0, 0.9).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bbox, FaceBox::new(4.0, 2.0, 16.0, 14.0, 0.95f32 as f64));
    }

    #[test]
    fn test_row_major_order() {
        let mut scores = Array2::<f32>::zeros((2, 2));
        scores[[1, 0]] = 0.99;
        scores[[0, 1]] = 0.98;
        let regression = Array3::<f32>::zeros((4, 2, 2));
        let out = generate(scores.view(), regression.view(), 1.0, 0.5).unwrap();
        let xs: Vec<f64> = out.iter().map(|c| c.bbox.x1).collect();
        assert_eq!(xs, vec![2.0, 0.0]);
    }

    #[test]
    fn test_maps_back_through_scale_rounding_half_even() {
        let mut scores = Array2::<f32>::zeros((4, 4));
        scores[[3, 1]] = 1.0;
        let regression = Array3::<f32>::zeros((4, 4, 4));
        // x = 2/4 = 0.5 → 0, x2 = 14/4 = 3.5 → 4
        let out = generate(scores.view(), regression.view(), 4.0, 0.5).unwrap();
        let b = out[0].bbox;
        assert_eq!((b.x1, b.x2), (0.0, 4.0));
        // y = 6/4 = 1.5 → 2, y2 = 18/4 = 4.5 → 4
        assert_eq!((b.y1, b.y2), (2.0, 4.0));
    }

    #[test]
    fn test_regression_carried_from_same_cell() {
        let mut scores = Array2::<f32>::zeros((2, 3));
        scores[[1, 2]] = 0.97;
        let mut regression = Array3::<f32>::zeros((4, 2, 3));
        for k in 0..4 {
            regression[[k, 1, 2]] = 0.25 * (k as f32 + 1.0);
        }
        let out = generate(scores.view(), regression.view(), 0.5, 0.6).unwrap();
        assert_eq!(out[0].regression, BoxRegression::new(0.25, 0.5, 0.75, 1.0));
    }

    #[test]
    fn test_no_cells_above_threshold() {
        let scores = Array2::<f32>::from_elem((5, 5), 0.3);
        let regression = Array3::<f32>::zeros((4, 5, 5));
        assert!(generate(scores.view(), regression.view(), 1.0, 0.9)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mismatched_regression_is_malformed() {
        let scores = Array2::<f32>::zeros((3, 3));
        let regression = Array3::<f32>::zeros((4, 2, 3));
        let err = generate(scores.view(), regression.view(), 1.0, 0.9).unwrap_err();
        assert!(matches!(
            err,
            DetectionError::MalformedOutput {
                stage: Stage::Proposal,
                ..
            }
        ));
    }
}
