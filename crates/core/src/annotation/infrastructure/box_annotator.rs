use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

pub const BOX_COLOR: [u8; 3] = [0, 0, 255];
pub const LANDMARK_COLOR: [u8; 3] = [255, 0, 0];

const LANDMARK_RADIUS: i32 = 2;

/// CPU painter for face boxes and landmark points.
///
/// Boxes are 1-px outlines through the truncated corner pixels; landmarks are
/// small circle outlines. Anything falling outside the frame is clipped.
pub struct BoxAnnotator {
    box_color: Rgb<u8>,
    landmark_color: Rgb<u8>,
}

impl BoxAnnotator {
    pub fn new(box_color: [u8; 3], landmark_color: [u8; 3]) -> Self {
        Self {
            box_color: Rgb(box_color),
            landmark_color: Rgb(landmark_color),
        }
    }
}

impl Default for BoxAnnotator {
    fn default() -> Self {
        Self::new(BOX_COLOR, LANDMARK_COLOR)
    }
}

impl FrameAnnotator for BoxAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        detections: &[Detection],
    ) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("cannot annotate a {}-channel frame", frame.channels()).into());
        }
        if detections.is_empty() {
            return Ok(());
        }
        let (width, height) = (frame.width(), frame.height());
        let mut canvas = RgbImage::from_raw(width, height, frame.data().to_vec())
            .ok_or("frame buffer does not match its dimensions")?;

        for detection in detections {
            let b = &detection.bbox;
            if let Some(rect) = outline_rect(b.x1, b.y1, b.x2, b.y2, width, height) {
                draw_hollow_rect_mut(&mut canvas, rect, self.box_color);
            }
            if let Some(landmarks) = &detection.landmarks {
                for &(x, y) in landmarks.points() {
                    let center = (clamp_coord(x, width), clamp_coord(y, height));
                    draw_hollow_circle_mut(&mut canvas, center, LANDMARK_RADIUS, self.landmark_color);
                }
            }
        }
        frame.data_mut().copy_from_slice(canvas.as_raw());
        Ok(())
    }
}

/// Truncated inclusive corners to a [`Rect`]. Edges far off the frame are
/// pulled in but stay outside it, so they are still not drawn.
fn outline_rect(x1: f64, y1: f64, x2: f64, y2: f64, width: u32, height: u32) -> Option<Rect> {
    let (left, right) = (clamp_coord(x1.min(x2), width), clamp_coord(x1.max(x2), width));
    let (top, bottom) = (clamp_coord(y1.min(y2), height), clamp_coord(y1.max(y2), height));
    if right < 0 || bottom < 0 || left >= width as i32 || top >= height as i32 {
        return None;
    }
    Some(Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32))
}

/// Truncates toward zero into `[-LANDMARK_RADIUS - 1, limit + LANDMARK_RADIUS]`.
fn clamp_coord(v: f64, limit: u32) -> i32 {
    let margin = LANDMARK_RADIUS + 1;
    if v.is_nan() {
        return -margin;
    }
    (v as i64).clamp(-(margin as i64), limit as i64 + margin as i64 - 1) as i32
}
