use log::trace;
use ndarray::{s, Array3, Array4, ArrayView3, Axis};

use super::geometry::PadWindow;
use super::image_pyramid::{normalize_into, resize_bilinear};

/// A `[N, 3, size, size]` model batch and, for each of its rows, the index
/// of the window it was cut from.
#[derive(Debug)]
pub struct PatchBatch {
    pub tensor: Array4<f32>,
    pub kept: Vec<usize>,
}

impl PatchBatch {
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }
}

/// Cuts one square patch per usable window out of `image` (HWC RGB8).
///
/// Each window's region is copied into a zero buffer of the window's own
/// size, so parts hanging over the border stay black, then resized to
/// `size × size` and normalized. Windows smaller than `min_side` or without
/// any pixel inside the image are skipped and do not appear in `kept`.
pub fn extract_patches(
    image: ArrayView3<u8>,
    windows: &[PadWindow],
    size: usize,
    min_side: i64,
    swap_red_blue: bool,
) -> PatchBatch {
    let channels = image.dim().2;
    let mut patches = Vec::with_capacity(windows.len());
    let mut kept = Vec::with_capacity(windows.len());

    for (i, window) in windows.iter().enumerate() {
        if window.min_side() < min_side.max(1) {
            trace!(
                "Dropping window {i}: {}x{} below {min_side}px",
                window.box_width,
                window.box_height
            );
            continue;
        }
        let Some(copy) = window.copy else {
            trace!("Dropping window {i}: outside the image");
            continue;
        };

        let mut buffer = Array3::<u8>::zeros((
            window.box_height as usize,
            window.box_width as usize,
            channels,
        ));
        buffer
            .slice_mut(s![copy.dst_y1..=copy.dst_y2, copy.dst_x1..=copy.dst_x2, ..])
            .assign(&image.slice(s![copy.src_y1..=copy.src_y2, copy.src_x1..=copy.src_x2, ..]));

        patches.push(resize_bilinear(buffer.view(), size, size));
        kept.push(i);
    }

    let mut tensor = Array4::<f32>::zeros((patches.len(), channels, size, size));
    for (patch, slot) in patches.iter().zip(tensor.axis_iter_mut(Axis(0))) {
        normalize_into(patch.view(), slot, swap_red_blue);
    }

    PatchBatch { tensor, kept }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::geometry::pad;
    use crate::shared::face_box::FaceBox;
    use approx::assert_relative_eq;

    const WHITE: f32 = 127.5 / 128.0;
    const BLACK: f32 = -127.5 / 128.0;

    fn white_image(w: usize, h: usize) -> Array3<u8> {
        Array3::from_elem((h, w, 3), 255)
    }

    fn boxed(x1: f64, y1: f64, x2: f64, y2: f64) -> FaceBox {
        FaceBox::new(x1, y1, x2, y2, 0.9)
    }

    #[test]
    fn test_inside_window_is_fully_copied() {
        let image = white_image(50, 50);
        let windows = pad(&[boxed(10.0, 10.0, 33.0, 33.0)], 50, 50);
        let batch = extract_patches(image.view(), &windows, 24, 20, true);
        assert_eq!(batch.tensor.dim(), (1, 3, 24, 24));
        assert_eq!(batch.kept, vec![0]);
        assert!(batch.tensor.iter().all(|&v| (v - WHITE).abs() < 1e-6));
    }

    #[test]
    fn test_overhang_is_zero_padded() {
        let image = white_image(50, 50);
        // Left half of the 24-px box lies outside the image.
        let windows = pad(&[boxed(-12.0, 0.0, 11.0, 23.0)], 50, 50);
        let batch = extract_patches(image.view(), &windows, 24, 20, false);
        assert_relative_eq!(batch.tensor[[0, 0, 5, 0]], BLACK);
        assert_relative_eq!(batch.tensor[[0, 0, 5, 23]], WHITE);
    }

    #[test]
    fn test_small_and_outside_windows_skipped() {
        let image = white_image(50, 50);
        let windows = pad(
            &[
                boxed(0.0, 0.0, 9.0, 9.0),       // 10 px
                boxed(100.0, 0.0, 139.0, 39.0),  // outside
                boxed(20.0, 20.0, 44.0, 44.0),   // usable
                boxed(30.0, 30.0, 10.0, 10.0),   // inverted
            ],
            50,
            50,
        );
        let batch = extract_patches(image.view(), &windows, 24, 20, true);
        assert_eq!(batch.kept, vec![2]);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_min_side_one_keeps_tiny_windows() {
        let image = white_image(50, 50);
        let windows = pad(&[boxed(0.0, 0.0, 4.0, 4.0)], 50, 50);
        let batch = extract_patches(image.view(), &windows, 48, 1, true);
        assert_eq!(batch.tensor.dim(), (1, 3, 48, 48));
    }

    #[test]
    fn test_no_windows_gives_empty_batch() {
        let image = white_image(10, 10);
        let batch = extract_patches(image.view(), &[], 24, 20, true);
        assert!(batch.is_empty());
        assert_eq!(batch.tensor.dim(), (0, 3, 24, 24));
    }
}
