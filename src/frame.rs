//! Decoded capture frames.

use image::{Rgba, RgbaImage};

/// One decoded frame, already cropped to the capture's bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in capture order.
    pub index: usize,
    /// Cropped RGBA pixels.
    pub image: RgbaImage,
}

impl Frame {
    /// Frame at position `index` in capture order.
    pub fn new(index: usize, image: RgbaImage) -> Self {
        Self { index, image }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&Rgba<u8>> {
        self.image.get_pixel_checked(x, y)
    }
}
