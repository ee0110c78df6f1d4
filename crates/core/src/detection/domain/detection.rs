use serde::Serialize;

use super::face_landmarks::FaceLandmarks;
use crate::shared::face_box::FaceBox;

/// One detected face.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: FaceBox,
    /// Always present for cascade output; other detectors may omit it.
    pub landmarks: Option<FaceLandmarks>,
}

impl Detection {
    pub fn new(bbox: FaceBox, landmarks: Option<FaceLandmarks>) -> Self {
        Self { bbox, landmarks }
    }

    pub fn score(&self) -> f64 {
        self.bbox.score
    }
}
