use super::detection::Detection;
use super::detection_error::DetectionError;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// `&mut self` because detectors drive stateful inference sessions. No
/// state may carry over from one frame to the next.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError>;
}
