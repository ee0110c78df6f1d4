use std::path::Path;

use crate::shared::frame::Frame;

/// Saves frame dumps and face crops. The format follows the path extension.
pub trait ImageWriter: Send {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}
