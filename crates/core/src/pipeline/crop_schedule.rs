use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::video_metadata::VideoMetadata;

/// When face crops are saved from detected frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropSchedule {
    /// Save on every frame with detections, straight into the crops directory.
    EveryDetection,
    /// Save once the elapsed whole seconds pass a deadline that advances by
    /// `seconds` after each save. The deadline starts at 0, so the first save
    /// happens once a full second has elapsed.
    Interval { seconds: u64 },
}

/// Where one batch of crops goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropSlot {
    Flat,
    Second(u64),
}

impl CropSlot {
    pub fn path(&self, crops_dir: &Path, face_index: usize) -> PathBuf {
        let file = format!("face_{face_index:02}.png");
        match self {
            CropSlot::Flat => crops_dir.join(file),
            CropSlot::Second(s) => crops_dir.join(format!("second_{s:04}")).join(file),
        }
    }
}

/// Stateful evaluation of a [`CropSchedule`] over one run.
#[derive(Debug)]
pub struct CropTracker {
    schedule: CropSchedule,
    next_due: u64,
    warned_no_fps: bool,
}

impl CropTracker {
    pub fn new(schedule: CropSchedule) -> Self {
        Self {
            schedule,
            next_due: 0,
            warned_no_fps: false,
        }
    }

    /// Decide whether the detected frame at `frame_index` saves crops.
    ///
    /// A `Some` result advances the interval deadline, so call this once per
    /// detected frame that actually has faces.
    pub fn due(&mut self, frame_index: usize, source: &VideoMetadata) -> Option<CropSlot> {
        let seconds = match self.schedule {
            CropSchedule::EveryDetection => return Some(CropSlot::Flat),
            CropSchedule::Interval { seconds } => seconds,
        };

        let Some(elapsed) = source.elapsed_seconds(frame_index) else {
            if !self.warned_no_fps {
                log::warn!("Source has no frame rate; interval crops are disabled");
                self.warned_no_fps = true;
            }
            return None;
        };

        if elapsed > self.next_due {
            self.next_due += seconds;
            Some(CropSlot::Second(elapsed))
        } else {
            None
        }
    }
}
