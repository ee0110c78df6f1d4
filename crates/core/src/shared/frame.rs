use ndarray::{ArrayView3, ArrayViewMut3};

/// A single video/image frame: contiguous interleaved bytes in row-major order.
///
/// Decoders hand over RGB24; the detector converts to whatever channel order
/// its models expect, so the rest of the pipeline never has to care.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `(height, width, channels)` view over the pixel buffer.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the half-open pixel rectangle `[x1, x2) × [y1, y2)`, clipped to
    /// the frame. Returns `None` when nothing of it lies inside the frame.
    pub fn crop(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Option<Frame> {
        let x1 = x1.clamp(0, self.width as i64) as usize;
        let y1 = y1.clamp(0, self.height as i64) as usize;
        let x2 = x2.clamp(0, self.width as i64) as usize;
        let y2 = y2.clamp(0, self.height as i64) as usize;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let row_len = (x2 - x1) * channels;
        let mut data = Vec::with_capacity(row_len * (y2 - y1));
        for row in y1..y2 {
            let start = (row * self.width as usize + x1) * channels;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Some(Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.index,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::new(data, width, height, 3, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12];
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_is_height_major() {
        let frame = gradient_frame(4, 2);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 4, 3]);
        assert_eq!(arr[[1, 3, 0]], 3);
        assert_eq!(arr[[1, 3, 1]], 1);
    }

    #[test]
    fn test_as_ndarray_mut_writes_through() {
        let mut frame = gradient_frame(2, 2);
        frame.as_ndarray_mut()[[0, 1, 2]] = 128;
        assert_eq!(frame.as_ndarray()[[0, 1, 2]], 128);
    }

    #[test]
    fn test_crop_inside() {
        let frame = gradient_frame(10, 8);
        let crop = frame.crop(2, 3, 6, 5).unwrap();
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.index(), 7);
        let arr = crop.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 2);
        assert_eq!(arr[[0, 0, 1]], 3);
        assert_eq!(arr[[1, 3, 0]], 5);
        assert_eq!(arr[[1, 3, 1]], 4);
    }

    #[test]
    fn test_crop_clips_to_frame() {
        let frame = gradient_frame(10, 8);
        let crop = frame.crop(-5, -5, 3, 100).unwrap();
        assert_eq!(crop.width(), 3);
        assert_eq!(crop.height(), 8);
        assert_eq!(crop.as_ndarray()[[0, 0, 0]], 0);
    }

    #[test]
    fn test_crop_outside_is_none() {
        let frame = gradient_frame(10, 8);
        assert!(frame.crop(20, 0, 30, 5).is_none());
        assert!(frame.crop(4, 4, 4, 6).is_none());
    }
}
