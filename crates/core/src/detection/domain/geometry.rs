//! Box geometry shared by the cascade stages: squaring, rounding, border
//! padding and regression calibration.
//!
//! All widths and heights use the inclusive-pixel convention of [`FaceBox`]
//! (`x2 - x1 + 1`).

use crate::shared::face_box::{BoxRegression, Candidate, FaceBox};

/// Inclusive pixel rectangle copied from the source image into a patch buffer.
///
/// Every bound satisfies `0 <= start <= end < dimension` for its own space:
/// `src_*` against the image, `dst_*` against the `box_width × box_height`
/// working buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyRegion {
    pub src_x1: usize,
    pub src_y1: usize,
    pub src_x2: usize,
    pub src_y2: usize,
    pub dst_x1: usize,
    pub dst_y1: usize,
    pub dst_x2: usize,
    pub dst_y2: usize,
}

impl CopyRegion {
    pub fn width(&self) -> usize {
        self.src_x2 - self.src_x1 + 1
    }

    pub fn height(&self) -> usize {
        self.src_y2 - self.src_y1 + 1
    }
}

/// Result of padding one box against the image bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadWindow {
    /// Width of the zero-initialized working buffer (the box's own width,
    /// possibly extending past the image).
    pub box_width: i64,
    pub box_height: i64,
    /// `None` when the box is degenerate or lies entirely outside the image.
    /// Non-finite or oversized boxes come back with a zero-sized buffer.
    pub copy: Option<CopyRegion>,
}

impl PadWindow {
    /// Smaller of the two working-buffer dimensions.
    pub fn min_side(&self) -> i64 {
        self.box_width.min(self.box_height)
    }
}

/// Grows each box to a square of side `max(w, h)` around the same center.
///
/// No rounding happens here; see [`round_boxes`].
pub fn to_square(boxes: &[FaceBox]) -> Vec<FaceBox> {
    boxes
        .iter()
        .map(|b| {
            let w = b.width();
            let h = b.height();
            let side = w.max(h);
            let x1 = b.x1 + w * 0.5 - side * 0.5;
            let y1 = b.y1 + h * 0.5 - side * 0.5;
            FaceBox::new(x1, y1, x1 + side - 1.0, y1 + side - 1.0, b.score)
        })
        .collect()
}

/// Snaps coordinates to the pixel grid, rounding half to even.
pub fn round_boxes(boxes: &[FaceBox]) -> Vec<FaceBox> {
    boxes
        .iter()
        .map(|b| {
            FaceBox::new(
                b.x1.round_ties_even(),
                b.y1.round_ties_even(),
                b.x2.round_ties_even(),
                b.y2.round_ties_even(),
                b.score,
            )
        })
        .collect()
}

/// Clips each box against a `width × height` image.
///
/// Coordinates are truncated toward zero first, so callers should round
/// beforehand.
pub fn pad(boxes: &[FaceBox], width: u32, height: u32) -> Vec<PadWindow> {
    boxes
        .iter()
        .map(|b| pad_one(b, width as i64, height as i64))
        .collect()
}

/// Working buffers may be at most this many times the image's longer side.
pub const MAX_WINDOW_SCALE: i64 = 4;

const DEGENERATE: PadWindow = PadWindow {
    box_width: 0,
    box_height: 0,
    copy: None,
};

fn pad_one(b: &FaceBox, width: i64, height: i64) -> PadWindow {
    if ![b.x1, b.y1, b.x2, b.y2].iter().all(|v| v.is_finite()) {
        return DEGENERATE;
    }
    let x1 = b.x1 as i64;
    let y1 = b.y1 as i64;
    let x2 = b.x2 as i64;
    let y2 = b.y2 as i64;
    let inclusive = |lo: i64, hi: i64| hi.checked_sub(lo).and_then(|d| d.checked_add(1));
    let (Some(box_width), Some(box_height)) = (inclusive(x1, x2), inclusive(y1, y2)) else {
        return DEGENERATE;
    };
    let max_side = width.max(height).max(1).saturating_mul(MAX_WINDOW_SCALE);
    if box_width > max_side || box_height > max_side {
        return DEGENERATE;
    }

    let copy = if box_width <= 0 || box_height <= 0 {
        None
    } else {
        clip_span(x1, x2, width).zip(clip_span(y1, y2, height)).map(
            |((src_x1, src_x2), (src_y1, src_y2))| CopyRegion {
                src_x1: src_x1 as usize,
                src_y1: src_y1 as usize,
                src_x2: src_x2 as usize,
                src_y2: src_y2 as usize,
                dst_x1: (src_x1 - x1) as usize,
                dst_y1: (src_y1 - y1) as usize,
                dst_x2: (src_x2 - x1) as usize,
                dst_y2: (src_y2 - y1) as usize,
            },
        )
    };

    PadWindow {
        box_width,
        box_height,
        copy,
    }
}

/// Intersection of the inclusive span `[start, end]` with `[0, limit)`.
fn clip_span(start: i64, end: i64, limit: i64) -> Option<(i64, i64)> {
    let lo = start.max(0);
    let hi = end.min(limit - 1);
    (lo <= hi).then_some((lo, hi))
}

/// Applies one regression offset per box: `x1 + dx1 * w`, `y1 + dy1 * h`, etc.
///
/// Scores are carried over unchanged.
pub fn calibrate(boxes: &[FaceBox], offsets: &[BoxRegression]) -> Vec<FaceBox> {
    debug_assert_eq!(boxes.len(), offsets.len());
    boxes
        .iter()
        .zip(offsets)
        .map(|(b, r)| calibrate_one(b, r))
        .collect()
}

/// Calibrates first-stage candidates with the regression they carry.
pub fn calibrate_candidates(candidates: &[Candidate]) -> Vec<FaceBox> {
    candidates
        .iter()
        .map(|c| calibrate_one(&c.bbox, &c.regression))
        .collect()
}

fn calibrate_one(b: &FaceBox, r: &BoxRegression) -> FaceBox {
    let w = b.width();
    let h = b.height();
    FaceBox::new(
        b.x1 + r.dx1 * w,
        b.y1 + r.dy1 * h,
        b.x2 + r.dx2 * w,
        b.y2 + r.dy2 * h,
        b.score,
    )
}
