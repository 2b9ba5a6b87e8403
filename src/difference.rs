//! Pixel-level frame comparison.
//!
//! Two frames are compared coordinate by coordinate over the capture's
//! bounding box using exact RGBA equality. [`DiffMode::Boolean`] stops at
//! the first mismatch; [`DiffMode::Count`] always scans the whole box.

use crate::{dimensions::CaptureDimensions, frame::Frame};

/// How much work a comparison should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMode {
    /// Stop at the first differing pixel.
    Boolean,
    /// Count every differing pixel.
    #[default]
    Count,
}

/// Result of comparing two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeMetrics {
    /// Whether any pixel differs.
    pub changed: bool,
    /// Number of differing pixels; only computed in [`DiffMode::Count`].
    pub differing_pixels: Option<u64>,
}

/// Compare two frames over `dims`.
pub fn compare(a: &Frame, b: &Frame, dims: CaptureDimensions, mode: DiffMode) -> ChangeMetrics {
    match mode {
        DiffMode::Boolean => ChangeMetrics {
            changed: frames_differ(a, b, dims),
            differing_pixels: None,
        },
        DiffMode::Count => {
            let count = count_differing_pixels(a, b, dims);
            ChangeMetrics {
                changed: count > 0,
                differing_pixels: Some(count),
            }
        }
    }
}

/// Whether any pixel inside the box differs. Returns at the first mismatch.
pub fn frames_differ(a: &Frame, b: &Frame, dims: CaptureDimensions) -> bool {
    let (width, height) = dims.size();
    (0..width).any(|x| (0..height).any(|y| a.pixel(x, y) != b.pixel(x, y)))
}

/// Number of pixels inside the box that differ. A coordinate present in
/// only one of the frames counts as differing.
pub fn count_differing_pixels(a: &Frame, b: &Frame, dims: CaptureDimensions) -> u64 {
    let (width, height) = dims.size();
    let mut count = 0;
    for x in 0..width {
        for y in 0..height {
            if a.pixel(x, y) != b.pixel(x, y) {
                count += 1;
            }
        }
    }
    count
}
