use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Frames per second; 0 for still images.
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Metadata for a still image treated as a one-frame video.
    pub fn still_image(width: u32, height: u32, source_path: Option<PathBuf>) -> Self {
        Self {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path,
        }
    }

    /// Whole seconds elapsed at `frame_index`, truncated. `None` without a frame rate.
    pub fn elapsed_seconds(&self, frame_index: usize) -> Option<u64> {
        if self.fps > 0.0 {
            Some((frame_index as f64 / self.fps) as u64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames: 900,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/test.mp4")),
        }
    }

    #[test]
    fn test_still_image() {
        let meta = VideoMetadata::still_image(800, 600, None);
        assert_eq!(meta.total_frames, 1);
        assert_eq!(meta.fps, 0.0);
        assert_eq!(meta.elapsed_seconds(0), None);
    }

    #[test]
    fn test_elapsed_seconds_truncates() {
        let meta = video(30.0);
        assert_eq!(meta.elapsed_seconds(0), Some(0));
        assert_eq!(meta.elapsed_seconds(29), Some(0));
        assert_eq!(meta.elapsed_seconds(30), Some(1));
        assert_eq!(meta.elapsed_seconds(95), Some(3));
    }

    #[test]
    fn test_elapsed_seconds_fractional_fps() {
        let meta = video(29.97);
        assert_eq!(meta.elapsed_seconds(90), Some(3));
        assert_eq!(meta.elapsed_seconds(89), Some(2));
    }
}
