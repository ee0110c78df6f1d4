//! Greedy non-maximum suppression with two overlap metrics.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::shared::face_box::FaceBox;

/// How the overlap between two boxes is normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapMode {
    /// Intersection over union.
    Union,
    /// Intersection over the smaller of the two areas. Removes nested boxes
    /// that plain IoU would keep.
    Minimum,
}

impl std::fmt::Display for OverlapMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlapMode::Union => write!(f, "union"),
            OverlapMode::Minimum => write!(f, "minimum"),
        }
    }
}

/// One configured suppression pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuppressionStep {
    pub threshold: f64,
    pub mode: OverlapMode,
}

impl SuppressionStep {
    pub const fn new(threshold: f64, mode: OverlapMode) -> Self {
        Self { threshold, mode }
    }

    pub fn apply(&self, boxes: &[FaceBox]) -> Vec<usize> {
        nms(boxes, self.threshold, self.mode)
    }
}

/// Overlap of two boxes under `mode`, using inclusive pixel areas.
///
/// Degenerate boxes contribute no overlap rather than dividing by zero.
pub fn overlap(a: &FaceBox, b: &FaceBox, mode: OverlapMode) -> f64 {
    let (area_a, area_b) = (a.area(), b.area());
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }

    let iw = (a.x2.min(b.x2) - a.x1.max(b.x1) + 1.0).max(0.0);
    let ih = (a.y2.min(b.y2) - a.y1.max(b.y1) + 1.0).max(0.0);
    let inter = iw * ih;
    if inter == 0.0 {
        return 0.0;
    }

    let denom = match mode {
        OverlapMode::Union => area_a + area_b - inter,
        OverlapMode::Minimum => area_a.min(area_b),
    };
    if denom <= 0.0 {
        return 0.0;
    }
    inter / denom
}

/// Returns the indices of the boxes that survive suppression, highest score
/// first.
///
/// The sort is stable, so equal scores keep their input order. A box is
/// removed only when its overlap with an already-kept box is strictly greater
/// than `threshold`.
pub fn nms(boxes: &[FaceBox], threshold: f64, mode: OverlapMode) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&i, &j| descending_score(&boxes[i], &boxes[j]));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for (pos, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order[pos + 1..] {
            if !suppressed[j] && overlap(&boxes[i], &boxes[j], mode) > threshold {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// NaN scores sort after every real score.
fn descending_score(a: &FaceBox, b: &FaceBox) -> Ordering {
    match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    }
}
