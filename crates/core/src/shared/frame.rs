use std::time::SystemTime;

use ndarray::{ArrayView3, ArrayViewMut3};

/// Channel order of a 3-channel frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelOrder {
    Rgb,
    Bgr,
}

/// A single camera frame: contiguous 8-bit samples in row-major order.
///
/// Frames leave the camera layer in BGR order; adapters that need another
/// order (the detector, JPEG encoding) convert at their own boundary.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    order: PixelOrder,
    index: usize,
    captured_at: SystemTime,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        order: PixelOrder,
        index: usize,
    ) -> Self {
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
            order,
            index,
            captured_at: SystemTime::now(),
        }
    }

    pub fn with_captured_at(mut self, captured_at: SystemTime) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
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

    pub fn order(&self) -> PixelOrder {
        self.order
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Copies the rectangle `[y, y+h) x [x, x+w)` out of this frame.
    ///
    /// The rectangle is clamped to the frame bounds; an empty intersection
    /// yields `None`.
    pub fn crop(&self, x: i32, y: i32, width: i32, height: i32) -> Option<Frame> {
        let x1 = x.max(0) as u32;
        let y1 = y.max(0) as u32;
        let x2 = (x.saturating_add(width)).clamp(0, self.width as i32) as u32;
        let y2 = (y.saturating_add(height)).clamp(0, self.height as i32) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let src_stride = self.width as usize * channels;
        let row_len = (x2 - x1) as usize * channels;
        let mut data = Vec::with_capacity(row_len * (y2 - y1) as usize);
        for row in y1..y2 {
            let start = row as usize * src_stride + x1 as usize * channels;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Some(Frame {
            data,
            width: x2 - x1,
            height: y2 - y1,
            channels: self.channels,
            order: self.order,
            index: self.index,
            captured_at: self.captured_at,
        })
    }

    /// Returns the samples reordered as RGB, borrowing when already RGB.
    pub fn to_rgb_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self.order {
            PixelOrder::Rgb => std::borrow::Cow::Borrowed(&self.data),
            PixelOrder::Bgr => {
                let mut out = self.data.clone();
                swap_red_blue(&mut out, self.channels as usize);
                std::borrow::Cow::Owned(out)
            }
        }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

/// Swaps the first and third sample of every pixel in place.
pub fn swap_red_blue(data: &mut [u8], channels: usize) {
    if channels < 3 {
        return;
    }
    for px in data.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
}
