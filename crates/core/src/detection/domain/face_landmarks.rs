//! Five-point facial landmarks produced by the finalize stage.

use serde::Serialize;

use crate::shared::face_box::FaceBox;

pub const LANDMARK_COUNT: usize = 5;

/// Landmark points in image pixels, ordered left eye, right eye, nose, left
/// mouth corner, right mouth corner.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceLandmarks {
    points: [(f64, f64); LANDMARK_COUNT],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Maps patch-relative model output back onto the image.
    ///
    /// `raw` is `[x0, y0, x1, y1, …]` in fractions of the patch; `patch` is
    /// the box the patch was cut from. Each point becomes
    /// `(w * x + x1 - 1, h * y + y1 - 1)` with inclusive `w` and `h`.
    pub fn decode(raw: &[f32; 2 * LANDMARK_COUNT], patch: &FaceBox) -> Self {
        let (w, h) = (patch.width(), patch.height());
        let mut points = [(0.0, 0.0); LANDMARK_COUNT];
        for (k, point) in points.iter_mut().enumerate() {
            let lx = raw[2 * k] as f64;
            let ly = raw[2 * k + 1] as f64;
            *point = (w * lx + patch.x1 - 1.0, h * ly + patch.y1 - 1.0);
        }
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); LANDMARK_COUNT] {
        &self.points
    }
}
