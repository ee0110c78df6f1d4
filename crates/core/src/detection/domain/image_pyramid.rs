//! Image pyramid for the proposal stage, plus the resampling and
//! normalization shared with patch extraction.

use ndarray::{Array3, Array4, ArrayView3, ArrayViewMut3};

use super::cascade_config::{CascadeConfig, PROPOSAL_CELL_SIZE};

/// One rescaled copy of the source image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PyramidLevel {
    pub scale: f64,
    pub width: usize,
    pub height: usize,
}

/// Scales and sizes of every pyramid level for a `width × height` image.
///
/// Starts at `12 / min_face_size` and shrinks by `scale_factor` per level.
/// Level sizes are truncated; a level is produced only while both sides
/// exceed the proposal cell. At most `max_pyramid_levels` are returned.
pub fn pyramid_levels(width: u32, height: u32, config: &CascadeConfig) -> Vec<PyramidLevel> {
    let mut levels = Vec::new();
    let mut scale = PROPOSAL_CELL_SIZE as f64 / config.min_face_size;

    while levels.len() < config.max_pyramid_levels {
        let level_w = (width as f64 * scale) as usize;
        let level_h = (height as f64 * scale) as usize;
        if level_w.min(level_h) <= PROPOSAL_CELL_SIZE {
            break;
        }
        levels.push(PyramidLevel {
            scale,
            width: level_w,
            height: level_h,
        });
        scale *= config.scale_factor;
    }

    levels
}

/// Resizes and normalizes `image` (HWC RGB8) into a `[1, 3, h, w]` batch for
/// the proposal model.
pub fn level_tensor(image: ArrayView3<u8>, level: &PyramidLevel, swap_red_blue: bool) -> Array4<f32> {
    let resized = resize_bilinear(image, level.width, level.height);
    let mut tensor = Array4::<f32>::zeros((1, 3, level.height, level.width));
    normalize_into(
        resized.view(),
        tensor.index_axis_mut(ndarray::Axis(0), 0),
        swap_red_blue,
    );
    tensor
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Bilinear resize of an HWC `u8` image to `out_w × out_h`.
///
/// Pixel centers sit at half-integer positions, samples past the edge reuse
/// the border pixel, and results round to the nearest `u8`. An empty source
/// yields an all-zero image.
pub fn resize_bilinear(src: ArrayView3<u8>, out_w: usize, out_h: usize) -> Array3<u8> {
    let (src_h, src_w, channels) = src.dim();
    let mut out = Array3::<u8>::zeros((out_h, out_w, channels));
    if src_h == 0 || src_w == 0 || out_w == 0 || out_h == 0 {
        return out;
    }

    let xs = sample_positions(src_w, out_w);
    let ys = sample_positions(src_h, out_h);

    for (oy, &(y0, y1, fy)) in ys.iter().enumerate() {
        for (ox, &(x0, x1, fx)) in xs.iter().enumerate() {
            for c in 0..channels {
                let top = lerp(src[[y0, x0, c]], src[[y0, x1, c]], fx);
                let bottom = lerp(src[[y1, x0, c]], src[[y1, x1, c]], fx);
                let v = top + (bottom - top) * fy;
                out[[oy, ox, c]] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// For each output index: the two source indices to blend and the weight of
/// the second.
fn sample_positions(src_len: usize, out_len: usize) -> Vec<(usize, usize, f64)> {
    let ratio = src_len as f64 / out_len as f64;
    let last = src_len - 1;
    (0..out_len)
        .map(|o| {
            let pos = (o as f64 + 0.5) * ratio - 0.5;
            let base = pos.floor();
            let frac = pos - base;
            if base < 0.0 {
                (0, 0, 0.0)
            } else if base as usize >= last {
                (last, last, 0.0)
            } else {
                let i = base as usize;
                (i, i + 1, frac)
            }
        })
        .collect()
}

fn lerp(a: u8, b: u8, t: f64) -> f64 {
    a as f64 + (b as f64 - a as f64) * t
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Writes `(v - 127.5) / 128` of an HWC image into a CHW slot.
///
/// With `swap_red_blue` the first and third channels trade places, turning
/// RGB frames into the BGR order the models were trained on.
pub fn normalize_into(src: ArrayView3<u8>, mut dst: ArrayViewMut3<f32>, swap_red_blue: bool) {
    let (h, w, channels) = src.dim();
    debug_assert_eq!(dst.dim(), (channels, h, w));

    for c in 0..channels {
        let src_c = if swap_red_blue && channels == 3 { 2 - c } else { c };
        for y in 0..h {
            for x in 0..w {
                dst[[c, y, x]] = (src[[y, x, src_c]] as f32 - 127.5) / 128.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn config(min_face_size: f64) -> CascadeConfig {
        CascadeConfig {
            min_face_size,
            ..Default::default()
        }
    }

    // ── pyramid_levels ──────────────────────────────────────────────

    #[test]
    fn test_first_level_from_min_face_size() {
        let levels = pyramid_levels(100, 100, &config(40.0));
        assert_relative_eq!(levels[0].scale, 0.3);
        assert_eq!((levels[0].width, levels[0].height), (30, 30));
    }

    #[test]
    fn test_min_face_below_cell_size_upsamples() {
        let levels = pyramid_levels(50, 40, &config(6.0));
        assert_relative_eq!(levels[0].scale, 2.0);
        assert_eq!((levels[0].width, levels[0].height), (100, 80));
    }

    #[test]
    fn test_levels_shrink_until_cell_size() {
        let levels = pyramid_levels(640, 480, &config(20.0));
        assert!(!levels.is_empty());
        for pair in levels.windows(2) {
            assert_relative_eq!(pair[1].scale, pair[0].scale * 0.79, epsilon = 1e-12);
        }
        for level in &levels {
            assert!(level.width.min(level.height) > 12);
        }
        let next = levels.last().unwrap().scale * 0.79;
        assert!(((480.0 * next) as usize) <= 12);
    }

    #[test]
    fn test_level_sizes_truncate() {
        // 101 * 0.3 = 30.3 → 30, 99 * 0.3 = 29.7 → 29
        let levels = pyramid_levels(101, 99, &config(40.0));
        assert_eq!((levels[0].width, levels[0].height), (30, 29));
    }

    #[rstest]
    #[case::too_small(30, 30, 40.0)]
    #[case::exactly_cell(40, 100, 40.0)]
    #[case::empty(0, 0, 20.0)]
    fn test_no_levels(#[case] w: u32, #[case] h: u32, #[case] min_face: f64) {
        assert!(pyramid_levels(w, h, &config(min_face)).is_empty());
    }

    #[test]
    fn test_level_cap() {
        let cfg = CascadeConfig {
            max_pyramid_levels: 3,
            ..Default::default()
        };
        assert_eq!(pyramid_levels(4000, 4000, &cfg).len(), 3);
    }

    // ── resize_bilinear ─────────────────────────────────────────────

    #[test]
    fn test_resize_constant_image_stays_constant() {
        let src = Array3::<u8>::from_elem((7, 9, 3), 200);
        let out = resize_bilinear(src.view(), 24, 24);
        assert!(out.iter().all(|&v| v == 200));
    }

    #[test]
    fn test_resize_identity() {
        let src = Array3::from_shape_fn((5, 6, 3), |(y, x, c)| (y * 40 + x * 7 + c) as u8);
        let out = resize_bilinear(src.view(), 6, 5);
        assert_eq!(out, src);
    }

    #[test]
    fn test_resize_upscale_interpolates_between_pixels() {
        // 1×2 → 1×4: sample positions -0.25, 0.25, 0.75, 1.25
        let src = Array3::from_shape_vec((1, 2, 1), vec![0u8, 100]).unwrap();
        let out = resize_bilinear(src.view(), 4, 1);
        let row: Vec<u8> = out.iter().copied().collect();
        assert_eq!(row, vec![0, 25, 75, 100]);
    }

    #[test]
    fn test_resize_downscale_by_two_averages_pairs() {
        let src = Array3::from_shape_vec((1, 4, 1), vec![10u8, 30, 50, 70]).unwrap();
        let out = resize_bilinear(src.view(), 2, 1);
        let row: Vec<u8> = out.iter().copied().collect();
        assert_eq!(row, vec![20, 60]);
    }

    #[test]
    fn test_resize_empty_source() {
        let src = Array3::<u8>::zeros((0, 0, 3));
        let out = resize_bilinear(src.view(), 4, 4);
        assert_eq!(out.dim(), (4, 4, 3));
    }

    // ── normalize_into ──────────────────────────────────────────────

    #[test]
    fn test_normalize_range_and_layout() {
        let src = Array3::from_shape_vec((1, 2, 3), vec![0u8, 128, 255, 10, 20, 30]).unwrap();
        let mut dst = Array3::<f32>::zeros((3, 1, 2));
        normalize_into(src.view(), dst.view_mut(), false);
        assert_relative_eq!(dst[[0, 0, 0]], -127.5 / 128.0);
        assert_relative_eq!(dst[[1, 0, 0]], 0.5 / 128.0);
        assert_relative_eq!(dst[[2, 0, 0]], 127.5 / 128.0);
        assert_relative_eq!(dst[[0, 0, 1]], (10.0 - 127.5) / 128.0);
    }

    #[test]
    fn test_normalize_swaps_red_and_blue() {
        let src = Array3::from_shape_vec((1, 1, 3), vec![255u8, 128, 0]).unwrap();
        let mut dst = Array3::<f32>::zeros((3, 1, 1));
        normalize_into(src.view(), dst.view_mut(), true);
        assert_relative_eq!(dst[[0, 0, 0]], -127.5 / 128.0);
        assert_relative_eq!(dst[[2, 0, 0]], 127.5 / 128.0);
    }

    #[test]
    fn test_level_tensor_shape() {
        let image = Array3::<u8>::from_elem((100, 80, 3), 127);
        let level = PyramidLevel {
            scale: 0.3,
            width: 24,
            height: 30,
        };
        let tensor = level_tensor(image.view(), &level, true);
        assert_eq!(tensor.dim(), (1, 3, 30, 24));
    }
}
