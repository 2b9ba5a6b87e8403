//! Capture bounding boxes and per-device profiles.
//!
//! Some recording setups capture more than the device screen (the camera
//! frame includes bezel and background). For those devices a fixed
//! bounding box is looked up by device identifier; everything else uses
//! the full native frame.

use image::{GenericImageView, RgbaImage};

/// Crop region applied to every frame of a capture.
///
/// Coordinates follow image conventions: `(x0, y0)` inclusive,
/// `(x1, y1)` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureDimensions {
    /// Left edge.
    pub x0: u32,
    /// Top edge.
    pub y0: u32,
    /// Right edge (exclusive).
    pub x1: u32,
    /// Bottom edge (exclusive).
    pub y1: u32,
}

impl CaptureDimensions {
    /// Bounding box from its corners. Inverted corners collapse to zero size.
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Full-frame bounding box for a native frame size.
    pub const fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Horizontal extent, zero when the corners are inverted.
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    /// Vertical extent, zero when the corners are inverted.
    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    /// `(width, height)` of the cropped frames.
    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Number of pixels in the bounding box.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// `(x0, y0, x1, y1)`.
    pub fn bbox(&self) -> (u32, u32, u32, u32) {
        (self.x0, self.y0, self.x1, self.y1)
    }

    /// Whether the box lies entirely within a native frame of this size.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x1 <= width && self.y1 <= height
    }

    /// Crop an image to this bounding box.
    ///
    /// The result is always exactly [`size`](Self::size). Any part of the box
    /// outside the source image is left transparent black.
    pub fn crop(&self, source: &RgbaImage) -> RgbaImage {
        let (width, height) = self.size();
        let (source_width, source_height) = source.dimensions();

        if self.x0 == 0 && self.y0 == 0 && (width, height) == (source_width, source_height) {
            return source.clone();
        }

        let mut cropped = RgbaImage::new(width, height);
        let copy_width = source_width.saturating_sub(self.x0).min(width);
        let copy_height = source_height.saturating_sub(self.y0).min(height);
        if copy_width > 0 && copy_height > 0 {
            let view = source.view(self.x0, self.y0, copy_width, copy_height);
            for (x, y, pixel) in view.pixels() {
                cropped.put_pixel(x, y, pixel);
            }
        }
        cropped
    }
}

/// Where a capture's bounding box comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionProfile {
    /// Full native frame, inferred from the first decoded frame.
    Inferred,
    /// Fixed bounding box from the device profile table.
    Named(String),
}

/// Known capture setups. Add a row to support a new device.
const DEVICE_PROFILES: &[(&str, CaptureDimensions)] = &[
    // LG Optimus 2X in portrait, captured through the HDMI rig.
    ("LG-P999", CaptureDimensions::new(613, 158, 1307, 1080)),
];

impl DimensionProfile {
    /// Pick the profile for a device identifier.
    pub fn for_device(device: &str) -> Self {
        if DEVICE_PROFILES.iter().any(|(name, _)| *name == device) {
            DimensionProfile::Named(device.to_string())
        } else {
            DimensionProfile::Inferred
        }
    }

    /// Resolve to a bounding box given the native size of the first frame.
    ///
    /// Returns `None` for [`Inferred`](Self::Inferred) when no frame exists.
    pub fn resolve(&self, first_frame_size: Option<(u32, u32)>) -> Option<CaptureDimensions> {
        match self {
            DimensionProfile::Named(device) => profile_dimensions(device),
            DimensionProfile::Inferred => first_frame_size
                .map(|(width, height)| CaptureDimensions::full_frame(width, height)),
        }
    }
}

/// Look up the fixed bounding box for a device, if one is registered.
pub fn profile_dimensions(device: &str) -> Option<CaptureDimensions> {
    DEVICE_PROFILES
        .iter()
        .find(|(name, _)| *name == device)
        .map(|(_, dimensions)| *dimensions)
}
