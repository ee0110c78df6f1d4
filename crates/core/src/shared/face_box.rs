use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixels with a confidence score.
///
/// Corners are inclusive: a box spanning pixels 10..=19 has `x1 = 10`,
/// `x2 = 19` and width 10.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: f64,
}

impl FaceBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score,
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1 + 1.0
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1 + 1.0
    }

    /// Pixel area; zero for inverted boxes.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn with_score(self, score: f64) -> Self {
        Self { score, ..self }
    }
}

/// Learned corner correction, in units of the box width/height.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoxRegression {
    pub dx1: f64,
    pub dy1: f64,
    pub dx2: f64,
    pub dy2: f64,
}

impl BoxRegression {
    pub fn new(dx1: f64, dy1: f64, dx2: f64, dy2: f64) -> Self {
        Self { dx1, dy1, dx2, dy2 }
    }
}

/// A first-stage box that still carries the regression of the cell that
/// produced it. Calibration is deferred until all pyramid levels are merged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub bbox: FaceBox,
    pub regression: BoxRegression,
}
