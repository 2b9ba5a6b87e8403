//! Capture archive builders shared by the integration tests.
//!
//! Captures are written into a temporary directory with the same layout
//! the recorder produces: `metadata.json`, `images/*.png`, and an
//! optional `movie.avi`.

#![allow(dead_code)]

use std::{
    fs::File,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::{Value, json};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Encode an image as PNG bytes.
pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("Failed to encode PNG");
    cursor.into_inner()
}

pub fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

/// A solid image with one pixel set to `color`.
pub fn with_pixel(base: &RgbaImage, x: u32, y: u32, color: Rgba<u8>) -> RgbaImage {
    let mut image = base.clone();
    image.put_pixel(x, y, color);
    image
}

/// Builder for a capture zip.
pub struct CaptureBuilder {
    metadata: Option<Value>,
    entries: Vec<(String, Vec<u8>)>,
    directories: Vec<String>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self {
            metadata: Some(json!({"version": 1, "device": "test-device", "fps": 60.0})),
            entries: Vec::new(),
            directories: Vec::new(),
        }
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.metadata = None;
        self
    }

    /// Add a frame as `images/frame<index>.png`.
    pub fn frame(self, index: usize, image: &RgbaImage) -> Self {
        let name = format!("images/frame{index}.png");
        self.entry(name, png_bytes(image))
    }

    /// Add frames numbered from 1 in the given order.
    pub fn frames<'a>(self, images: impl IntoIterator<Item = &'a RgbaImage>) -> Self {
        images
            .into_iter()
            .enumerate()
            .fold(self, |builder, (index, image)| builder.frame(index + 1, image))
    }

    pub fn movie(self, bytes: &[u8]) -> Self {
        self.entry("movie.avi", bytes.to_vec())
    }

    pub fn entry(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.entries.push((name.into(), bytes));
        self
    }

    pub fn directory(mut self, name: impl Into<String>) -> Self {
        self.directories.push(name.into());
        self
    }

    pub fn write(self, path: &Path) -> PathBuf {
        let file = File::create(path).expect("Failed to create capture file");
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for directory in &self.directories {
            zip.add_directory(directory.as_str(), options)
                .expect("Failed to add directory");
        }
        if let Some(metadata) = &self.metadata {
            zip.start_file("metadata.json", options)
                .expect("Failed to start metadata entry");
            zip.write_all(metadata.to_string().as_bytes())
                .expect("Failed to write metadata");
        }
        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options)
                .expect("Failed to start entry");
            zip.write_all(bytes).expect("Failed to write entry");
        }
        zip.finish().expect("Failed to finish capture");
        path.to_path_buf()
    }
}
